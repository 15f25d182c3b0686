//! Project manifest (package.json) handling

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "package.json";

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

/// The manifest seeded into a new project before install
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectManifest {
    pub name: String,
    pub version: String,
    pub private: bool,
}

impl ProjectManifest {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            version: "0.1.0".to_string(),
            private: true,
        }
    }

    /// Pretty JSON with platform line endings and a trailing newline
    pub fn to_json(&self) -> Result<String, ManifestError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ManifestError::Parse(e.to_string()))?;
        Ok(format!("{}{}", json.replace('\n', LINE_ENDING), LINE_ENDING))
    }

    /// Write `package.json` into `root`, returning its path
    pub async fn write(&self, root: &Path) -> Result<PathBuf, ManifestError> {
        let path = root.join(MANIFEST_FILE);
        tokio::fs::write(&path, self.to_json()?)
            .await
            .map_err(|e| ManifestError::Io {
                path: path.clone(),
                message: e.to_string(),
            })?;
        Ok(path)
    }
}

/// Minimal package.json structure of an installed package
#[derive(Debug, Default, Deserialize)]
pub struct PackageJson {
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub engines: Option<HashMap<String, String>>,
}

impl PackageJson {
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(content).map_err(|e| ManifestError::Parse(e.to_string()))
    }

    /// Read `package.json` from a package directory
    pub async fn read_from_dir(dir: &Path) -> Result<Self, ManifestError> {
        let path = dir.join(MANIFEST_FILE);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ManifestError::Io {
                path: path.clone(),
                message: e.to_string(),
            })?;
        Self::parse(&content)
    }

    /// Declared package name, or an error naming the manifest
    pub fn require_name(self, dir: &Path) -> Result<String, ManifestError> {
        self.name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ManifestError::MissingName(dir.join(MANIFEST_FILE)))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("IO error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No \"name\" field in {0}")]
    MissingName(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_field_order() {
        let json = ProjectManifest::new("my-app").to_json().unwrap();
        let name = json.find("\"name\"").unwrap();
        let version = json.find("\"version\"").unwrap();
        let private = json.find("\"private\"").unwrap();
        assert!(name < version && version < private);
        assert!(json.ends_with(LINE_ENDING));
        assert!(json.contains("\"version\": \"0.1.0\""));
        assert!(json.contains("\"private\": true"));
    }

    #[tokio::test]
    async fn test_write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = ProjectManifest::new("my-app").write(dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("package.json"));

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["name"], "my-app");

        let pkg = PackageJson::read_from_dir(dir.path()).await.unwrap();
        assert_eq!(pkg.require_name(dir.path()).unwrap(), "my-app");
    }

    #[test]
    fn test_package_json_parse() {
        let json = r#"{
            "name": "otter-scripts",
            "version": "1.0.0",
            "engines": { "node": ">=14" }
        }"#;

        let pkg = PackageJson::parse(json).unwrap();
        assert_eq!(pkg.name.as_deref(), Some("otter-scripts"));
        assert_eq!(pkg.version.as_deref(), Some("1.0.0"));
        assert_eq!(
            pkg.engines.unwrap().get("node").map(String::as_str),
            Some(">=14")
        );
    }

    #[test]
    fn test_missing_name() {
        let pkg = PackageJson::parse(r#"{ "version": "1.0.0" }"#).unwrap();
        let err = pkg.require_name(Path::new("/pkg")).unwrap_err();
        assert!(matches!(err, ManifestError::MissingName(_)));
    }
}
