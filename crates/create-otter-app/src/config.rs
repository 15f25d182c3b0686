//! Configuration file parsing for create-otter-app.toml.

use otter_create::initializer::DEFAULT_ENTRY;
use otter_create::{BootstrapConfig, Installer, PackageManagerKind};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file names to search for
const CONFIG_NAMES: &[&str] = &["create-otter-app.toml", ".create-otter-app.toml"];

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Scripts package settings
    #[serde(default)]
    pub scripts: ScriptsConfig,

    /// Package manager used for the install step
    #[serde(default)]
    pub package_manager: PackageManagerConfig,

    /// Initializer handoff settings
    #[serde(default)]
    pub initializer: InitializerConfig,
}

/// Scripts package configuration.
#[derive(Debug, Deserialize)]
pub struct ScriptsConfig {
    /// Registry name of the default scripts package
    #[serde(default = "default_scripts_package")]
    pub package: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            package: default_scripts_package(),
        }
    }
}

/// Package manager configuration.
#[derive(Debug, Default, Deserialize)]
pub struct PackageManagerConfig {
    /// `npm` or `yarn`
    #[serde(default)]
    pub kind: PackageManagerKind,

    /// Executable to run instead of the kind's default
    pub program: Option<String>,
}

/// Initializer configuration.
#[derive(Debug, Deserialize)]
pub struct InitializerConfig {
    /// Program that executes the initializer entry
    #[serde(default = "default_runtime")]
    pub runtime: String,

    /// Entry path relative to the installed scripts package
    #[serde(default = "default_entry")]
    pub entry: PathBuf,

    /// Warn when the runtime does not satisfy the package's `engines`
    #[serde(default = "default_true")]
    pub check_engines: bool,
}

impl Default for InitializerConfig {
    fn default() -> Self {
        Self {
            runtime: default_runtime(),
            entry: default_entry(),
            check_engines: true,
        }
    }
}

fn default_scripts_package() -> String {
    "otter-scripts".to_string()
}

fn default_runtime() -> String {
    "node".to_string()
}

fn default_entry() -> PathBuf {
    PathBuf::from(DEFAULT_ENTRY)
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Apply command-line overrides on top of file values
    pub fn apply_overrides(&mut self, use_yarn: bool, program: Option<String>) {
        if use_yarn {
            self.package_manager.kind = PackageManagerKind::Yarn;
        }
        if program.is_some() {
            self.package_manager.program = program;
        }
    }

    pub fn installer(&self) -> Installer {
        let kind = self.package_manager.kind;
        match &self.package_manager.program {
            Some(program) => Installer::with_program(kind, program.clone()),
            None => Installer::new(kind),
        }
    }

    pub fn to_bootstrap_config(&self) -> BootstrapConfig {
        BootstrapConfig {
            scripts_package: self.scripts.package.clone(),
            installer: self.installer(),
            initializer_entry: self.initializer.entry.clone(),
            engine_runtime: self
                .initializer
                .check_engines
                .then(|| self.initializer.runtime.clone()),
        }
    }
}

/// Load configuration from a file or search for default config files from `start`.
pub fn load_config(path: Option<&Path>, start: &Path) -> anyhow::Result<Config> {
    let config_path = path
        .map(PathBuf::from)
        .or_else(|| find_config_file(start));

    match config_path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
            tracing::debug!(path = %path.display(), "loaded configuration");
            Ok(config)
        }
        Some(path) => anyhow::bail!("Config file not found: {}", path.display()),
        None => Ok(Config::default()),
    }
}

/// Search for a configuration file in `start` and its parent directories.
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        for name in CONFIG_NAMES {
            let path = current.join(name);
            if path.exists() {
                return Some(path);
            }
        }
        dir = current.parent();
    }
    None
}
