//! Runtime version check against the installed scripts package.
//!
//! Only ever warns: the initializer decides for itself whether it can run.

use crate::initializer::DEPENDENCY_DIR;
use crate::manifest::PackageJson;
use crate::progress::Progress;
use semver::{Version, VersionReq};
use std::path::Path;
use tokio::process::Command;

/// `engines` key checked in the scripts package manifest
const ENGINE_KEY: &str = "node";

/// Whether `version` satisfies an npm-style range (`||` alternatives allowed).
///
/// `None` when the range cannot be parsed.
pub fn satisfies(range: &str, version: &Version) -> Option<bool> {
    let mut any_parsed = false;
    for alternative in range.split("||") {
        let alternative = alternative.trim();
        let alternative = if alternative.is_empty() { "*" } else { alternative };
        if let Ok(req) = VersionReq::parse(alternative) {
            any_parsed = true;
            if req.matches(version) {
                return Some(true);
            }
        }
    }
    any_parsed.then_some(false)
}

/// Parse `v18.17.0` style `--version` output
pub fn parse_runtime_version(output: &str) -> Option<Version> {
    let trimmed = output.trim();
    Version::parse(trimmed.strip_prefix('v').unwrap_or(trimmed)).ok()
}

async fn runtime_version(runtime: &str) -> Option<Version> {
    let output = Command::new(runtime).arg("--version").output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    parse_runtime_version(&String::from_utf8_lossy(&output.stdout))
}

/// Warn when `runtime` does not satisfy the package's declared engine range
pub async fn check_engine(root: &Path, package_name: &str, runtime: &str, progress: &Progress) {
    let package_dir = root.join(DEPENDENCY_DIR).join(package_name);
    let Ok(pkg) = PackageJson::read_from_dir(&package_dir).await else {
        return;
    };
    if pkg.engines.as_ref().and_then(|e| e.get(ENGINE_KEY)).is_none() {
        return;
    }
    let Some(version) = runtime_version(runtime).await else {
        tracing::debug!(runtime, "could not determine runtime version");
        return;
    };

    if let Some(message) = engine_warning(package_name, &pkg, runtime, &version) {
        progress.warn(&message);
    }
}

/// The mismatch message, if `runtime_version` falls outside the declared range
fn engine_warning(
    package_name: &str,
    pkg: &PackageJson,
    runtime: &str,
    runtime_version: &Version,
) -> Option<String> {
    let range = pkg.engines.as_ref()?.get(ENGINE_KEY)?;
    if satisfies(range, runtime_version) != Some(false) {
        return None;
    }
    let package = match &pkg.version {
        Some(version) => format!("{}@{}", package_name, version),
        None => package_name.to_string(),
    };
    Some(format!(
        "You are running {} {}. {} requires {} {}; please update your runtime.",
        runtime, runtime_version, package, ENGINE_KEY, range
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_satisfies() {
        assert_eq!(satisfies(">=14", &v("18.2.0")), Some(true));
        assert_eq!(satisfies(">=14.0.0", &v("12.22.1")), Some(false));
        assert_eq!(satisfies("^12.22.0 || >=14", &v("12.22.5")), Some(true));
        assert_eq!(satisfies("^12.22.0 || >=14", &v("13.0.0")), Some(false));
        assert_eq!(satisfies("not a range", &v("1.0.0")), None);
    }

    #[test]
    fn test_parse_runtime_version() {
        assert_eq!(parse_runtime_version("v18.17.0\n"), Some(v("18.17.0")));
        assert_eq!(parse_runtime_version("20.1.0"), Some(v("20.1.0")));
        assert_eq!(parse_runtime_version("garbage"), None);
    }

    #[test]
    fn test_engine_warning_names_package_version() {
        let pkg = PackageJson::parse(
            r#"{ "name": "otter-scripts", "version": "2.1.0", "engines": { "node": ">=20" } }"#,
        )
        .unwrap();

        let message = engine_warning("otter-scripts", &pkg, "node", &v("18.17.0")).unwrap();
        assert_eq!(
            message,
            "You are running node 18.17.0. otter-scripts@2.1.0 requires node >=20; please update your runtime."
        );
        assert!(engine_warning("otter-scripts", &pkg, "node", &v("20.1.0")).is_none());
    }

    #[test]
    fn test_engine_warning_without_version_or_range() {
        let pkg = PackageJson::parse(r#"{ "name": "s", "engines": { "node": "^14" } }"#).unwrap();
        let message = engine_warning("s", &pkg, "node", &v("16.0.0")).unwrap();
        assert!(message.contains(". s requires node ^14;"));

        let pkg = PackageJson::parse(r#"{ "name": "s", "version": "1.0.0" }"#).unwrap();
        assert!(engine_warning("s", &pkg, "node", &v("16.0.0")).is_none());
    }

    #[tokio::test]
    async fn test_check_engine_without_manifest_is_silent() {
        let dir = tempfile::TempDir::new().unwrap();
        check_engine(dir.path(), "otter-scripts", "node", &Progress::silent()).await;
    }
}
