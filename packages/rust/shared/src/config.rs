//! Application configuration for docmesh.
//!
//! User config lives at `~/.docmesh/docmesh.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocmeshError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docmesh.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docmesh";

// ---------------------------------------------------------------------------
// Config structs (matching docmesh.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pipeline selection and gating.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Front matter contribution settings.
    #[serde(default)]
    pub front_matter: FrontMatterConfig,

    /// Source repositories whose docs are aggregated.
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Transform names to leave out of the built pipeline.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Treat dependency validation warnings as failures.
    #[serde(default)]
    pub fail_on_warnings: bool,
}

/// `[front_matter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontMatterConfig {
    /// Priority of the patch contributed by the front matter builder.
    #[serde(default = "default_builder_priority")]
    pub builder_priority: i32,

    /// Priority of the patch contributed by the edit link injector.
    #[serde(default = "default_edit_link_priority")]
    pub edit_link_priority: i32,

    /// How repository tags combine with tags already on the page:
    /// "replace", "union" or "append".
    #[serde(default = "default_tags_strategy")]
    pub tags_strategy: String,
}

impl Default for FrontMatterConfig {
    fn default() -> Self {
        Self {
            builder_priority: default_builder_priority(),
            edit_link_priority: default_edit_link_priority(),
            tags_strategy: default_tags_strategy(),
        }
    }
}

fn default_builder_priority() -> i32 {
    50
}
fn default_edit_link_priority() -> i32 {
    60
}
fn default_tags_strategy() -> String {
    "union".into()
}

/// A `[[repositories]]` entry: one documentation source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Short repository name, used in front matter and document ids.
    pub name: String,
    /// Clone URL or web URL of the repository.
    pub url: String,
    /// Branch the docs are taken from.
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Directory inside the repository that holds the docs.
    #[serde(default = "default_docs_path")]
    pub docs_path: String,
    /// Web base for edit links (e.g. `https://github.com/org/repo/edit`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_url_base: Option<String>,
    /// Site section the docs land in (defaults to the repository name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Tags added to every page from this repository.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

fn default_branch() -> String {
    "main".into()
}
fn default_docs_path() -> String {
    "docs".into()
}

impl AppConfig {
    /// Look up a configured repository by name.
    pub fn repository(&self, name: &str) -> Option<&RepositoryConfig> {
        self.repositories.iter().find(|r| r.name == name)
    }
}

// ---------------------------------------------------------------------------
// Pipeline settings (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime settings consumed by the built-in transformers.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Transform names excluded from the pipeline.
    pub exclude: Vec<String>,
    /// Whether validation warnings gate processing.
    pub fail_on_warnings: bool,
    /// Front matter builder patch priority.
    pub builder_priority: i32,
    /// Edit link patch priority.
    pub edit_link_priority: i32,
    /// Tag combination strategy name.
    pub tags_strategy: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            exclude: config.pipeline.exclude.clone(),
            fail_on_warnings: config.pipeline.fail_on_warnings,
            builder_priority: config.front_matter.builder_priority,
            edit_link_priority: config.front_matter.edit_link_priority,
            tags_strategy: config.front_matter.tags_strategy.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docmesh/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DocmeshError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docmesh/docmesh.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocmeshError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DocmeshError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    init_config_in(&config_dir()?)
}

/// Write a default config file into `dir`, creating it if needed.
pub fn init_config_in(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| DocmeshError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocmeshError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocmeshError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configs that parse but cannot drive a pipeline.
fn validate_config(config: &AppConfig) -> Result<()> {
    match config.front_matter.tags_strategy.as_str() {
        "replace" | "union" | "append" => {}
        other => {
            return Err(DocmeshError::config(format!(
                "unknown tags_strategy {other:?}: expected replace, union or append"
            )));
        }
    }

    let mut seen = std::collections::BTreeSet::new();
    for repo in &config.repositories {
        if repo.name.trim().is_empty() {
            return Err(DocmeshError::config("repository entry with empty name"));
        }
        if !seen.insert(repo.name.as_str()) {
            return Err(DocmeshError::config(format!(
                "repository {:?} is configured twice",
                repo.name
            )));
        }
    }

    Ok(())
}
