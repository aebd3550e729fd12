//! File-per-key backend.
//!
//! Each key maps to `<dir>/<key>.json`. Writes go to a uniquely named
//! temporary file in the same directory which is then renamed over the
//! target, so a reader sees either the old value or the new one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{Error, Result};

use super::{validate_key, KeyValueStore};

/// Extension of files holding values.
const VALUE_EXTENSION: &str = "json";

/// A [`KeyValueStore`] backed by a directory of files.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|source| Error::DirectoryCreate {
                path: dir.clone(),
                source,
            })?;
        }
        debug!("Opened file store at {}", dir.display());
        Ok(Self { dir })
    }

    /// The directory holding the values.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKey`] if `key` would name a file outside the
    /// store directory or a hidden file.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.{VALUE_EXTENSION}")))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!(".{key}.{}.tmp", Uuid::new_v4()))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        let target = self.path_for(key)?;
        let tmp = self.temp_path_for(key);

        std::fs::write(&tmp, value).map_err(|source| Error::StorageWrite {
            path: tmp.clone(),
            source,
        })?;

        if let Err(source) = std::fs::rename(&tmp, &target) {
            if let Err(e) = std::fs::remove_file(&tmp) {
                error!(path = %tmp.display(), error = %e, "Failed to remove temporary file");
            }
            return Err(Error::StorageWrite {
                path: target,
                source,
            });
        }
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
