//! Common paths for thumbcache data
//!
//! Configuration lives under ~/.config/thumbcache/ on all platforms.

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Get the thumbcache config directory (~/.config/thumbcache/)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("thumbcache"))
}

/// Get the config file path (~/.config/thumbcache/config.toml)
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// File name for a fetched thumbnail, with resource separators flattened.
pub fn thumbnail_file_name(uid: &str) -> String {
    let stem: String = uid
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    format!("{stem}.jpg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_file_name() {
        assert_eq!(thumbnail_file_name("10000001"), "10000001.jpg");
        assert_eq!(thumbnail_file_name("m1/P0001.JPG"), "m1_P0001.JPG.jpg");
        assert_eq!(thumbnail_file_name("../x"), ".._x.jpg");
    }
}
