//! Project name validation.
//!
//! The project directory's base name becomes the manifest `name`, so it has
//! to be a name the registry would accept.

const MAX_NAME_LENGTH: usize = 214;

const RESERVED_NAMES: &[&str] = &["node_modules", "favicon.ico"];

/// Check `name` against registry naming rules and the scripts package
pub fn validate_app_name(name: &str, scripts_package: &str) -> Result<(), NameError> {
    let problems = naming_problems(name);
    if !problems.is_empty() {
        return Err(NameError::Invalid {
            name: name.to_string(),
            problems,
        });
    }

    if name == scripts_package {
        return Err(NameError::Reserved {
            name: name.to_string(),
            package: scripts_package.to_string(),
        });
    }

    Ok(())
}

fn naming_problems(name: &str) -> Vec<String> {
    let mut problems = Vec::new();

    if name.is_empty() {
        problems.push("name length must be greater than zero".to_string());
        return problems;
    }
    if name.trim() != name {
        problems.push("name cannot contain leading or trailing spaces".to_string());
    }
    if name.starts_with('.') {
        problems.push("name cannot start with a period".to_string());
    }
    if name.starts_with('_') {
        problems.push("name cannot start with an underscore".to_string());
    }
    if name.len() > MAX_NAME_LENGTH {
        problems.push(format!(
            "name can no longer contain more than {} characters",
            MAX_NAME_LENGTH
        ));
    }
    if name.chars().any(|c| c.is_uppercase()) {
        problems.push("name can no longer contain capital letters".to_string());
    }
    if name.chars().any(|c| "~'!()*".contains(c)) {
        problems.push("name can no longer contain special characters (\"~'!()*\")".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-._~'!()*".contains(c))
    {
        problems.push("name can only contain URL-friendly characters".to_string());
    }
    if RESERVED_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
        problems.push(format!("{} is a blacklisted name", name));
    }

    problems
}

#[derive(Debug, thiserror::Error)]
pub enum NameError {
    #[error("Cannot create a project named \"{name}\" because of registry naming restrictions:\n  * {}", .problems.join("\n  * "))]
    Invalid { name: String, problems: Vec<String> },

    #[error("Cannot create a project named \"{name}\" because a dependency with the same name exists ({package})")]
    Reserved { name: String, package: String },
}
