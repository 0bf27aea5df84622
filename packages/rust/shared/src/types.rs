//! Core domain types shared by the docmesh crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RepositoryConfig;

/// A document's front matter: string keys to arbitrary YAML/JSON values.
///
/// Backed by a sorted map so iteration and serialization order never
/// depend on insertion history.
pub type FrontMatter = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// DocumentId
// ---------------------------------------------------------------------------

/// Identity of one source document, used to attribute failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId {
    /// Repository the document came from (empty for ad-hoc files).
    pub repository: String,
    /// Path relative to the repository's docs directory.
    pub path: String,
}

impl DocumentId {
    pub fn new(repository: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            path: path.into(),
        }
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.repository.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}:{}", self.repository, self.path)
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentContext
// ---------------------------------------------------------------------------

/// Where a document came from, filled in by the document source before the
/// pipeline runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentContext {
    /// Path relative to the docs directory (e.g. `guide/install.md`).
    pub path: String,
    /// Repository name.
    pub repository: String,
    /// Repository web URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    /// Site section; `None` falls back to the repository name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Base URL for edit links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_url_base: Option<String>,
    /// Branch the document was read from.
    pub branch: String,
    /// Docs directory inside the repository.
    pub docs_path: String,
    /// Last modification time of the source file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Repository-level tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl DocumentContext {
    /// Context for a document of a configured repository.
    pub fn for_repository(repo: &RepositoryConfig, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            repository: repo.name.clone(),
            repository_url: Some(repo.url.clone()),
            section: repo.section.clone(),
            edit_url_base: repo.edit_url_base.clone(),
            branch: repo.branch.clone(),
            docs_path: repo.docs_path.clone(),
            last_modified: None,
            tags: repo.tags.clone(),
        }
    }

    /// Set the source file's modification time.
    pub fn with_last_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = Some(at);
        self
    }

    /// The section the document belongs to.
    pub fn section(&self) -> &str {
        self.section.as_deref().unwrap_or(&self.repository)
    }

    /// Identity used in logs and error attribution.
    pub fn id(&self) -> DocumentId {
        DocumentId::new(&self.repository, &self.path)
    }
}
