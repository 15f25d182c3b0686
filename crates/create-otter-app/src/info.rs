//! `--info` - print environment information for bug reports.

use crate::config::Config;
use anyhow::Result;
use tokio::process::Command;

#[derive(serde::Serialize)]
struct EnvironmentInfo {
    version: String,
    platform: String,
    arch: String,
    cwd: Option<String>,
    package_manager: ToolInfo,
    runtime: ToolInfo,
    scripts_package: String,
}

#[derive(serde::Serialize)]
struct ToolInfo {
    program: String,
    version: Option<String>,
}

impl ToolInfo {
    async fn probe(program: &str) -> Self {
        let version = Command::new(program)
            .arg("--version")
            .output()
            .await
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());
        Self {
            program: program.to_string(),
            version,
        }
    }

    fn describe(&self) -> String {
        match &self.version {
            Some(v) => format!("{} ({})", v, self.program),
            None => format!("Not found ({})", self.program),
        }
    }
}

/// Print environment information
pub async fn run(config: &Config, json: bool) -> Result<()> {
    let installer = config.installer();
    let info = EnvironmentInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cwd: std::env::current_dir()
            .ok()
            .map(|p| p.display().to_string()),
        package_manager: ToolInfo::probe(installer.program()).await,
        runtime: ToolInfo::probe(&config.initializer.runtime).await,
        scripts_package: config.scripts.package.clone(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("Environment Info:");
    println!();
    println!("  create-otter-app: {}", info.version);
    println!("  Platform:         {} ({})", info.platform, info.arch);
    if let Some(cwd) = &info.cwd {
        println!("  CWD:              {}", cwd);
    }
    println!("  Package manager:  {}", info.package_manager.describe());
    println!("  Runtime:          {}", info.runtime.describe());
    println!("  Scripts package:  {}", info.scripts_package);

    Ok(())
}
