//! Engine configuration.
//!
//! Loaded from a TOML table; every field has a default so an empty table
//! is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dirent;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VtreeConfig {
    /// Number of inode slots in the arena, root included.
    pub nr_inodes: usize,

    /// Longest accepted name component, in bytes.
    pub max_name_len: usize,

    /// Longest path the resolver will build while splicing symlinks.
    pub max_path_len: usize,

    /// Number of symlinks one lookup may traverse before failing.
    pub max_symlinks: u32,

    /// Size of the getdents staging buffer.
    pub getdents_buf_size: usize,

    /// Upper bound on bytes returned by a single read.
    pub read_buf_size: usize,
}

impl Default for VtreeConfig {
    fn default() -> Self {
        Self {
            nr_inodes: 1024,
            max_name_len: 255,
            max_path_len: 1024,
            max_symlinks: 8,
            getdents_buf_size: 4096,
            read_buf_size: 4096,
        }
    }
}

impl VtreeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nr_inodes == 0 {
            return Err(invalid("nr_inodes", "the arena needs at least the root slot"));
        }
        if self.max_name_len == 0 || self.max_name_len > u16::MAX as usize {
            return Err(invalid("max_name_len", "must be between 1 and 65535"));
        }
        if self.max_path_len <= self.max_name_len {
            return Err(invalid("max_path_len", "must exceed max_name_len"));
        }
        if self.max_symlinks == 0 {
            return Err(invalid("max_symlinks", "must be at least 1"));
        }
        let largest = dirent::record_len(self.max_name_len);
        if self.getdents_buf_size < largest {
            return Err(invalid(
                "getdents_buf_size",
                format!("must hold one {largest}-byte record"),
            ));
        }
        if self.read_buf_size == 0 {
            return Err(invalid("read_buf_size", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        VtreeConfig::default().validate().unwrap();
    }

    #[test]
    fn test_empty_toml_gives_defaults() {
        let cfg = VtreeConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, VtreeConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let cfg = VtreeConfig::from_toml_str("nr_inodes = 16\nmax_symlinks = 3").unwrap();
        assert_eq!(cfg.nr_inodes, 16);
        assert_eq!(cfg.max_symlinks, 3);
        assert_eq!(cfg.max_name_len, 255);
    }

    #[test]
    fn test_rejects_zero_inodes() {
        let err = VtreeConfig::from_toml_str("nr_inodes = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "nr_inodes", .. }));
    }

    #[test]
    fn test_rejects_small_getdents_buffer() {
        let err = VtreeConfig::from_toml_str("getdents_buf_size = 64").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "getdents_buf_size",
                ..
            }
        ));
    }

    #[test]
    fn test_parse_error() {
        let err = VtreeConfig::from_toml_str("nr_inodes = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = VtreeConfig::load("/nonexistent/vtreefs.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
