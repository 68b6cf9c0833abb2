use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{Document, FileStore, StoreError, validate_name};
use crate::highlight::HighlightBackground;

const STATE_DIR: &str = ".codepane";
const SESSION_FILE: &str = "session.json";

/// Workspace layout that survives restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub open_tabs: Vec<String>,
    pub active_tab: Option<String>,
    pub theme: HighlightBackground,
    pub theme_assist: bool,
}

/// Documents stored as files in one flat directory.
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            name: root.display().to_string(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load the saved session, if any.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_session(&self) -> Result<Option<Session>, StoreError> {
        let path = self.session_path();
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(io_error(&path, source)),
        }
    }

    /// # Errors
    /// Returns an error if the session file cannot be written.
    pub fn save_session(&self, session: &Session) -> Result<(), StoreError> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }
        let raw = serde_json::to_string_pretty(session)?;
        fs::write(&path, raw).map_err(|source| io_error(&path, source))
    }

    fn session_path(&self) -> PathBuf {
        self.root.join(STATE_DIR).join(SESSION_FILE)
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }
}

fn io_error(path: &Path, source: io::Error) -> StoreError {
    StoreError::Io {
        name: path.display().to_string(),
        source,
    }
}

impl FileStore for DirStore {
    fn get(&self, name: &str) -> Result<Document, StoreError> {
        let path = self.path_for(name)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Document::new(name, content)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(name.to_string()))
            }
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                Err(StoreError::NotText(name.to_string()))
            }
            Err(source) => Err(io_error(&path, source)),
        }
    }

    fn put(&mut self, document: Document) -> Result<(), StoreError> {
        let path = self.path_for(document.name())?;
        fs::write(&path, &document.content).map_err(|source| io_error(&path, source))
    }

    fn remove(&mut self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(name.to_string()))
            }
            Err(source) => Err(io_error(&path, source)),
        }
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.root).map_err(|source| io_error(&self.root, source))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| io_error(&self.root, source))?;
            if !entry.file_type().is_ok_and(|ty| ty.is_file()) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && !name.starts_with('.')
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
