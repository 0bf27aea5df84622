//! The transformer contract and its dependency declarations.

use serde::Serialize;

use docmesh_shared::Result;

use crate::page::PageAdapter;
use crate::stage::Stage;

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

/// Ordering constraints and advisory capability flags of a transformer.
///
/// Ordering constraints only become graph edges between transformers of the
/// same stage. Capability flags are metadata for tooling; nothing checks
/// them before running a transformer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependencies {
    /// Transformers that must run before this one.
    pub must_run_after: Vec<String>,
    /// Transformers that must run after this one.
    pub must_run_before: Vec<String>,
    /// What the transformer reads and writes.
    pub capabilities: Capabilities,
}

impl Dependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `name` to run first.
    pub fn after(mut self, name: impl Into<String>) -> Self {
        self.must_run_after.push(name.into());
        self
    }

    /// Require `name` to run later.
    pub fn before(mut self, name: impl Into<String>) -> Self {
        self.must_run_before.push(name.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Every transformer named in either direction.
    pub fn referenced(&self) -> impl Iterator<Item = &str> {
        self.must_run_after
            .iter()
            .chain(&self.must_run_before)
            .map(String::as_str)
    }
}

/// Advisory description of what a transformer touches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub requires_original_front_matter: bool,
    pub modifies_content: bool,
    pub modifies_front_matter: bool,
    pub requires_config: bool,
    pub requires_forge_info: bool,
    pub requires_edit_link_resolver: bool,
    pub requires_file_metadata: bool,
}

impl Capabilities {
    /// Names of the flags that are set, for display.
    pub fn flags(&self) -> Vec<&'static str> {
        [
            (self.requires_original_front_matter, "requires-original-front-matter"),
            (self.modifies_content, "modifies-content"),
            (self.modifies_front_matter, "modifies-front-matter"),
            (self.requires_config, "requires-config"),
            (self.requires_forge_info, "requires-forge-info"),
            (self.requires_edit_link_resolver, "requires-edit-link-resolver"),
            (self.requires_file_metadata, "requires-file-metadata"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect()
    }
}

// ---------------------------------------------------------------------------
// Transformer
// ---------------------------------------------------------------------------

/// A named, stateless unit of work bound to one stage.
///
/// One instance is built at start-up and reused for every document, so
/// implementations keep per-document state on the page, never on `self`.
pub trait Transformer: Send + Sync {
    /// Unique name; the registry key.
    fn name(&self) -> &str;

    /// Stage label. Anything other than one of the seven [`Stage`] names is
    /// rejected when the pipeline is built.
    fn stage(&self) -> &str;

    /// Ordering constraints and capability flags.
    fn dependencies(&self) -> Dependencies {
        Dependencies::default()
    }

    /// Apply the transformation to one document.
    ///
    /// A transformer that needs a capability the adapter does not expose
    /// must return `Ok(())` without touching the page.
    fn transform(&self, page: &mut dyn PageAdapter) -> Result<()>;

    /// The parsed stage, or `None` when [`Transformer::stage`] is invalid.
    fn resolved_stage(&self) -> Option<Stage> {
        self.stage().parse().ok()
    }
}
