//! Keyed text documents.
//!
//! [`FileStore`] is the collaborator contract; [`MemoryStore`] backs the
//! open workspace and [`DirStore`] persists it to a directory.

mod dir;

use std::collections::BTreeMap;

use thiserror::Error;

pub use dir::{DirStore, Session};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document `{0}` not found")]
    NotFound(String),
    #[error("document `{0}` already exists")]
    AlreadyExists(String),
    #[error("invalid document name `{0}`")]
    InvalidName(String),
    #[error("document `{0}` is not UTF-8 text")]
    NotText(String),
    #[error("i/o error for `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("session file is malformed: {0}")]
    Session(#[from] serde_json::Error),
}

/// Check that `name` can be stored by every [`FileStore`].
///
/// Names are flat file names: non-blank, no leading dot and no path
/// separators.
///
/// # Errors
/// Returns [`StoreError::InvalidName`] otherwise.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.trim().is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\']);
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

/// Kind of file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Html,
    Js,
    Css,
    Markdown,
    Json,
    Python,
    Text,
}

impl FileKind {
    /// Kind for a file name; unknown extensions are plain text.
    pub fn from_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "html" | "htm" => Self::Html,
            "js" => Self::Js,
            "css" => Self::Css,
            "md" | "markdown" => Self::Markdown,
            "json" => Self::Json,
            "py" => Self::Python,
            _ => Self::Text,
        }
    }

    /// Language tag used for highlighting and completion.
    pub const fn language(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Js => "javascript",
            Self::Css => "css",
            Self::Markdown => "markdown",
            Self::Json => "json",
            Self::Python => "python",
            Self::Text => "plaintext",
        }
    }

    /// Markdown is shown highlighted but cannot be edited in place.
    pub const fn is_editable(self) -> bool {
        !matches!(self, Self::Markdown)
    }
}

/// A named, language-tagged text buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    name: String,
    kind: FileKind,
    /// Full text, stored exactly as written.
    pub content: String,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: FileKind::from_name(&name),
            name,
            content: content.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn kind(&self) -> FileKind {
        self.kind
    }

    pub const fn language(&self) -> &'static str {
        self.kind.language()
    }

    /// The same content under another name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self::new(name, self.content.clone())
    }
}

/// Storage for documents keyed by name.
pub trait FileStore {
    /// # Errors
    /// [`StoreError::NotFound`] when no document has `name`.
    fn get(&self, name: &str) -> Result<Document, StoreError>;

    /// Insert or replace a document.
    ///
    /// # Errors
    /// Returns an error when the document cannot be written.
    fn put(&mut self, document: Document) -> Result<(), StoreError>;

    /// # Errors
    /// [`StoreError::NotFound`] when no document has `name`.
    fn remove(&mut self, name: &str) -> Result<(), StoreError>;

    /// Names of all documents, sorted.
    ///
    /// # Errors
    /// Returns an error when the backing storage cannot be listed.
    fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Move a document to a new key.
    ///
    /// # Errors
    /// [`StoreError::AlreadyExists`] when `to` is taken, or any error from
    /// the underlying operations.
    fn rename(&mut self, from: &str, to: &str) -> Result<(), StoreError> {
        if self.list()?.iter().any(|name| name == to) {
            return Err(StoreError::AlreadyExists(to.to_string()));
        }
        let document = self.get(from)?;
        self.put(document.renamed(to))?;
        self.remove(from)
    }
}

/// In-memory document map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    documents: BTreeMap<String, Document>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        Self {
            documents: documents
                .into_iter()
                .map(|doc| (doc.name.clone(), doc))
                .collect(),
        }
    }

    pub fn document(&self, name: &str) -> Option<&Document> {
        self.documents.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.documents.contains_key(name)
    }

    /// Replace a document's content wholesale.
    ///
    /// Returns `false` if there is no such document.
    pub fn set_content(&mut self, name: &str, content: String) -> bool {
        self.documents
            .get_mut(name)
            .map(|doc| doc.content = content)
            .is_some()
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl FileStore for MemoryStore {
    fn get(&self, name: &str) -> Result<Document, StoreError> {
        self.documents
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn put(&mut self, document: Document) -> Result<(), StoreError> {
        validate_name(document.name())?;
        self.documents.insert(document.name.clone(), document);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), StoreError> {
        self.documents
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.documents.keys().cloned().collect())
    }
}

/// Documents a fresh workspace starts with.
pub fn starter_documents() -> Vec<Document> {
    vec![
        Document::new(
            "index.html",
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n  <meta charset=\"UTF-8\">\n  <title>New project</title>\n  <link rel=\"stylesheet\" href=\"style.css\">\n</head>\n<body>\n  <h1>Hello!</h1>\n  <button>Click</button>\n  <script src=\"script.js\"></script>\n</body>\n</html>\n",
        ),
        Document::new(
            "script.js",
            "document.querySelector('button')?.addEventListener('click', () => {\n  console.log('clicked');\n});\n",
        ),
        Document::new(
            "style.css",
            "body {\n  margin: 0;\n  font-family: monospace;\n}\n\nh1 {\n  text-align: center;\n}\n",
        ),
        Document::new(
            "README.md",
            "# New project\n\n- Edit files from the sidebar.\n- Press Tab in the editor for a completion.\n",
        ),
    ]
}
