//! Shared utility functions for transient crates

use camino::Utf8PathBuf;

use crate::error::{Error, Result};

/// Get the user's home directory
///
/// Prefers the HOME environment variable over `dirs::home_dir()` so that an
/// overridden HOME (containers, tests) is respected.
pub fn get_home_dir() -> Result<Utf8PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            return Ok(Utf8PathBuf::from(home));
        }
    }

    let home = dirs::home_dir()
        .ok_or_else(|| Error::invalid_config("Could not determine home directory"))?;
    Utf8PathBuf::from_path_buf(home)
        .map_err(|path| Error::invalid_config(format!("Home directory is not UTF-8: {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_home_dir_from_env() {
        // HOME is typically set in CI/test environments
        if std::env::var("HOME").is_ok_and(|home| !home.is_empty()) {
            let home = get_home_dir().unwrap();
            assert!(!home.as_str().is_empty());
        }
    }
}
