//! Shared types, error model, and configuration for docmesh.
//!
//! This crate is the foundation depended on by all other docmesh crates.
//! It provides:
//! - [`DocmeshError`], the unified error type
//! - Domain types ([`FrontMatter`], [`DocumentContext`], [`DocumentId`])
//! - Configuration ([`AppConfig`], [`PipelineSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FrontMatterConfig, PipelineConfig, PipelineSettings, RepositoryConfig, config_dir,
    config_file_path, init_config, init_config_in, load_config, load_config_from,
};
pub use error::{DocmeshError, Result};
pub use types::{DocumentContext, DocumentId, FrontMatter};
