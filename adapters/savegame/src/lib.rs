#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Save files for Freeserf games.
//!
//! Games are written in an INI-like text format ([`write_text`]). Loading
//! accepts that format and falls back once to the fixed-width big-endian
//! binary layout read by [`read_legacy`].

use std::fs;
use std::path::{Path, PathBuf};

use freeserf_world::Game;

mod legacy;
mod text;

pub use legacy::{is_legacy, read_legacy, LEGACY_MAGIC, LEGACY_VERSION};
pub use text::{read_text, write_text, TEXT_VERSION};

/// File extension of text saves.
pub const SAVE_EXTENSION: &str = "save";

/// Errors raised while reading or writing save files.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// The file system refused an operation.
    #[error("{}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The text format was malformed.
    #[error("line {line}: {reason}")]
    Parse {
        /// One-based line number.
        line: usize,
        /// What went wrong.
        reason: String,
    },
    /// The binary format was malformed.
    #[error("byte {offset}: {reason}")]
    DataParse {
        /// Offset at which reading failed.
        offset: usize,
        /// What went wrong.
        reason: String,
    },
    /// Neither format could read the file.
    #[error("not a text save ({text}) nor a binary save ({binary})")]
    Unreadable {
        /// Failure of the text reader.
        text: Box<SaveError>,
        /// Failure of the binary reader.
        binary: Box<SaveError>,
    },
    /// Save names may not contain path separators or be empty.
    #[error("invalid save name `{0}`")]
    InvalidName(String),
}

/// Folder of save files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameStore {
    folder: PathBuf,
}

impl GameStore {
    /// Store rooted at `folder`; the folder is created on first save.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    /// Folder holding the saves.
    #[must_use]
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Path the save called `name` is written to.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, SaveError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\'])
            && name.chars().all(|c| !c.is_control());
        if !valid {
            return Err(SaveError::InvalidName(name.to_owned()));
        }
        Ok(self.folder.join(format!("{name}.{SAVE_EXTENSION}")))
    }

    /// Writes `game` as a text save called `name`, returning its path.
    ///
    /// The file is written next to its destination and renamed into place.
    pub fn try_save(&self, game: &Game, name: &str) -> Result<PathBuf, SaveError> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.folder).map_err(|source| SaveError::Io {
            path: self.folder.clone(),
            source,
        })?;
        let staging = path.with_extension("tmp");
        fs::write(&staging, write_text(game)).map_err(|source| SaveError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| SaveError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Writes `game` as `name`, logging the outcome.
    pub fn save(&self, game: &Game, name: &str) -> bool {
        match self.try_save(game, name) {
            Ok(path) => {
                tracing::info!(path = %path.display(), "game saved");
                true
            }
            Err(error) => {
                tracing::error!(%error, name, "failed to save game");
                false
            }
        }
    }

    /// Reads the save at `path` in either format.
    pub fn try_load(&self, path: &Path) -> Result<Game, SaveError> {
        let bytes = fs::read(path).map_err(|source| SaveError::Io {
            path: path.to_owned(),
            source,
        })?;
        let text_error = match std::str::from_utf8(&bytes) {
            Ok(text) => match read_text(text) {
                Ok(game) => return Ok(game),
                Err(error) => error,
            },
            Err(error) => SaveError::Parse {
                line: 0,
                reason: error.to_string(),
            },
        };

        tracing::warn!(
            path = %path.display(),
            error = %text_error,
            "not a text save, trying the binary layout"
        );
        read_legacy(&bytes).map_err(|binary| SaveError::Unreadable {
            text: Box::new(text_error),
            binary: Box::new(binary),
        })
    }

    /// Reads the save at `path`, logging and returning `None` on failure.
    pub fn load(&self, path: &Path) -> Option<Game> {
        match self.try_load(path) {
            Ok(game) => {
                tracing::info!(path = %path.display(), "game loaded");
                Some(game)
            }
            Err(error) => {
                tracing::error!(path = %path.display(), %error, "failed to load game");
                None
            }
        }
    }

    /// Reads the save called `name`.
    pub fn load_named(&self, name: &str) -> Option<Game> {
        match self.path_for(name) {
            Ok(path) => self.load(&path),
            Err(error) => {
                tracing::error!(%error, "failed to load game");
                None
            }
        }
    }

    /// Names of the saves in the folder, sorted.
    ///
    /// A missing folder holds no saves.
    pub fn list_saves(&self) -> Result<Vec<String>, SaveError> {
        let entries = match fs::read_dir(&self.folder) {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SaveError::Io {
                    path: self.folder.clone(),
                    source,
                })
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| SaveError::Io {
                path: self.folder.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(SAVE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_names_stay_inside_the_folder() {
        let store = GameStore::new("saves");
        assert_eq!(
            store.path_for("first").expect("plain name"),
            Path::new("saves").join("first.save")
        );
        for name in ["", "../escape", "a/b", ".hidden", "tab\there"] {
            assert!(
                matches!(store.path_for(name), Err(SaveError::InvalidName(_))),
                "{name:?} accepted"
            );
        }
    }
}
