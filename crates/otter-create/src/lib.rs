//! Otter project bootstrapper.
//!
//! This crate creates a project directory, seeds a manifest, installs a
//! scripts package through an external package manager and hands the
//! project over to the initializer shipped inside that package.

pub mod app_name;
pub mod bootstrap;
pub mod engines;
pub mod guard;
pub mod initializer;
pub mod installer;
pub mod manifest;
pub mod package_name;
pub mod progress;
pub mod reference;
pub mod workspace;

pub use app_name::{NameError, validate_app_name};
pub use bootstrap::{Bootstrap, BootstrapConfig, BootstrapError, BootstrapOptions, RollbackOutcome};
pub use guard::{DirectoryCheck, GuardError, check_directory, ensure_clean};
pub use initializer::{InitContext, Initializer, InitializerError, ScriptInitializer};
pub use installer::{InstallError, Installer, PackageManagerKind};
pub use manifest::{ManifestError, PackageJson, ProjectManifest};
pub use package_name::{ExtractError, NameExtractor};
pub use progress::Progress;
pub use reference::{PackageReference, resolve};
pub use workspace::TempWorkspace;
