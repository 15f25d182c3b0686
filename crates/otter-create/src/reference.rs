//! Scripts package reference resolution.
//!
//! Turns the loosely typed `--scripts-version` argument into a concrete
//! installable reference. Classification is an ordered list of predicates;
//! the first one that recognizes the input wins, anything left over is
//! passed through untouched.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// An installable package reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageReference {
    /// Bare package name, registry picks the version
    RegistryDefault { name: String },
    /// `name@1.2.3`
    RegistryVersioned { name: String, version: semver::Version },
    /// `name@tag` (tag stored without the leading `@`)
    RegistryTagged { name: String, tag: String },
    /// `@scope/name[@tag]`
    ScopedTagged {
        scope: String,
        name: String,
        tag: Option<String>,
    },
    /// `file:` reference to a package directory, always absolute
    LocalPath(PathBuf),
    /// Local `.tgz` / `.tar.gz` archive
    TarballPath(String),
    /// Remote `.tgz` / `.tar.gz` archive
    TarballUrl(String),
    /// `git+<url>[#ref]`
    GitUrl(String),
    /// Anything else (fork names, unrecognized specs)
    RawPassthrough(String),
}

impl PackageReference {
    /// The argument handed to the package manager
    pub fn as_install_arg(&self) -> String {
        self.to_string()
    }

    pub fn is_tarball(&self) -> bool {
        matches!(self, Self::TarballPath(_) | Self::TarballUrl(_))
    }
}

impl fmt::Display for PackageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegistryDefault { name } => f.write_str(name),
            Self::RegistryVersioned { name, version } => write!(f, "{}@{}", name, version),
            Self::RegistryTagged { name, tag } => write!(f, "{}@{}", name, tag),
            Self::ScopedTagged { scope, name, tag } => {
                write!(f, "@{}/{}", scope, name)?;
                if let Some(tag) = tag {
                    write!(f, "@{}", tag)?;
                }
                Ok(())
            }
            Self::LocalPath(path) => write!(f, "file:{}", path.display()),
            Self::TarballPath(raw)
            | Self::TarballUrl(raw)
            | Self::GitUrl(raw)
            | Self::RawPassthrough(raw) => f.write_str(raw),
        }
    }
}

/// A single classification rule: `(scripts package, raw input, original cwd)`
type Classifier = fn(&str, &str, &Path) -> Option<PackageReference>;

/// Rules in priority order
const CLASSIFIERS: &[Classifier] = &[
    classify_semver,
    classify_dist_tag,
    classify_local_path,
    classify_tarball_url,
    classify_tarball_path,
    classify_git_url,
    classify_scoped,
];

/// Resolve a raw `--scripts-version` value against the scripts package name.
///
/// Relative `file:` paths are resolved against `original_cwd`, never against
/// the process working directory.
pub fn resolve(package: &str, raw: Option<&str>, original_cwd: &Path) -> PackageReference {
    let Some(raw) = raw else {
        return PackageReference::RegistryDefault {
            name: package.to_string(),
        };
    };

    let reference = CLASSIFIERS
        .iter()
        .find_map(|classify| classify(package, raw, original_cwd))
        .unwrap_or_else(|| PackageReference::RawPassthrough(raw.to_string()));

    tracing::debug!(raw, reference = %reference, "resolved scripts reference");
    reference
}

fn classify_semver(package: &str, raw: &str, _cwd: &Path) -> Option<PackageReference> {
    // A single leading `v` or `=` is tolerated, as registry clients do.
    let candidate = raw
        .strip_prefix('v')
        .or_else(|| raw.strip_prefix('='))
        .unwrap_or(raw);
    let version = semver::Version::parse(candidate).ok()?;
    Some(PackageReference::RegistryVersioned {
        name: package.to_string(),
        version,
    })
}

fn classify_dist_tag(package: &str, raw: &str, _cwd: &Path) -> Option<PackageReference> {
    let tag = raw.strip_prefix('@')?;
    if tag.contains('/') {
        return None;
    }
    Some(PackageReference::RegistryTagged {
        name: package.to_string(),
        tag: tag.to_string(),
    })
}

fn classify_local_path(_package: &str, raw: &str, cwd: &Path) -> Option<PackageReference> {
    let path = raw.strip_prefix("file:")?;
    Some(PackageReference::LocalPath(absolutize(cwd, Path::new(path))))
}

fn classify_tarball_url(_package: &str, raw: &str, _cwd: &Path) -> Option<PackageReference> {
    let remote = raw.starts_with("https://") || raw.starts_with("http://");
    (remote && is_tarball_name(raw)).then(|| PackageReference::TarballUrl(raw.to_string()))
}

fn classify_tarball_path(_package: &str, raw: &str, _cwd: &Path) -> Option<PackageReference> {
    is_tarball_name(raw).then(|| PackageReference::TarballPath(raw.to_string()))
}

fn classify_git_url(_package: &str, raw: &str, _cwd: &Path) -> Option<PackageReference> {
    raw.starts_with("git+").then(|| PackageReference::GitUrl(raw.to_string()))
}

fn classify_scoped(_package: &str, raw: &str, _cwd: &Path) -> Option<PackageReference> {
    let rest = raw.strip_prefix('@')?;
    let (scope, spec) = rest.split_once('/')?;
    let (name, tag) = match spec.split_once('@') {
        Some((name, tag)) => (name, Some(tag.to_string())),
        None => (spec, None),
    };
    Some(PackageReference::ScopedTagged {
        scope: scope.to_string(),
        name: name.to_string(),
        tag,
    })
}

/// `foo.tgz` or `foo.tar.gz`, with something before the extension
pub(crate) fn is_tarball_name(raw: &str) -> bool {
    [".tgz", ".tar.gz"]
        .iter()
        .any(|ext| raw.len() > ext.len() && raw.ends_with(ext))
}

/// Join `path` onto `base` and fold `.` / `..` lexically
pub(crate) fn absolutize(base: &Path, path: &Path) -> PathBuf {
    let joined = base.join(path);
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
