use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Config file read when `--config` is not given and the file exists.
pub(crate) const DEFAULT_CONFIG_FILE: &str = "freeserf.toml";

/// Settings read from the optional TOML config file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct CliConfig {
    /// Folder holding save files.
    pub(crate) save_folder: PathBuf,
    /// Map size used for new games and generated terrain.
    pub(crate) map_size: u32,
    /// Seed of the terrain generator.
    pub(crate) map_seed: u64,
    /// Tracing filter used when `RUST_LOG` is unset.
    pub(crate) log_filter: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            save_folder: PathBuf::from("saves"),
            map_size: 3,
            map_seed: 0x5eed,
            log_filter: "info".to_owned(),
        }
    }
}

impl CliConfig {
    /// Loads `explicit`, else the default file when present, else defaults.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("invalid config toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_keep_their_defaults() {
        let config = CliConfig::parse("map_size = 5\n").expect("valid toml");
        assert_eq!(config.map_size, 5);
        assert_eq!(config.save_folder, PathBuf::from("saves"));
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(CliConfig::parse("map_sise = 5\n").is_err());
    }

    #[test]
    fn explicit_files_must_exist() {
        let folder = tempfile::tempdir().expect("temp dir");
        assert!(CliConfig::load(Some(&folder.path().join("absent.toml"))).is_err());

        let path = folder.path().join("freeserf.toml");
        fs::write(&path, "save_folder = \"elsewhere\"\nmap_seed = 7\n").expect("write");
        let config = CliConfig::load(Some(&path)).expect("readable config");
        assert_eq!(config.save_folder, PathBuf::from("elsewhere"));
        assert_eq!(config.map_seed, 7);
    }
}
