//! Built-in transformers.
//!
//! | Name | Stage |
//! |------|-------|
//! | `front_matter_parser` | parse |
//! | `front_matter_builder` | build |
//! | `edit_link_injector` | enrich |
//! | `front_matter_merge` | merge |
//! | `relative_link_rewriter` | transform |
//! | `heading_stripper` | finalize |
//! | `serializer` | serialize |
//!
//! Each declares its predecessor explicitly even where stage rank already
//! orders them, which keeps every non-core transform referenced.

mod content;
mod edit_link;
mod front_matter;
mod serialize;

use std::sync::Arc;

use tracing::warn;

use docmesh_shared::{PipelineSettings, Result};

use crate::merge::ArrayStrategy;
use crate::transformer::Transformer;

pub use content::{HeadingStripper, RelativeLinkRewriter};
pub use edit_link::EditLinkInjector;
pub use front_matter::{FrontMatterBuilder, FrontMatterMerge, FrontMatterParser};
pub use serialize::Serializer;

pub const FRONT_MATTER_PARSER: &str = "front_matter_parser";
pub const FRONT_MATTER_BUILDER: &str = "front_matter_builder";
pub const EDIT_LINK_INJECTOR: &str = "edit_link_injector";
pub const FRONT_MATTER_MERGE: &str = "front_matter_merge";
pub const RELATIVE_LINK_REWRITER: &str = "relative_link_rewriter";
pub const HEADING_STRIPPER: &str = "heading_stripper";
pub const SERIALIZER: &str = "serializer";

/// Structural transforms exempt from the "not referenced" validation warning.
pub const CORE_TRANSFORMS: &[&str] = &[FRONT_MATTER_PARSER, FRONT_MATTER_MERGE, SERIALIZER];

/// Every built-in transformer, configured from `settings`.
pub fn defaults(settings: &PipelineSettings) -> Result<Vec<Arc<dyn Transformer>>> {
    let tags_strategy: ArrayStrategy = settings.tags_strategy.parse()?;

    Ok(vec![
        Arc::new(FrontMatterParser),
        Arc::new(FrontMatterBuilder::new(
            settings.builder_priority,
            tags_strategy,
        )),
        Arc::new(EditLinkInjector::new(settings.edit_link_priority)),
        Arc::new(FrontMatterMerge),
        Arc::new(RelativeLinkRewriter),
        Arc::new(HeadingStripper),
        Arc::new(Serializer),
    ])
}

/// Logs a transformer passing over a page whose adapter lacks `capability`.
pub(crate) fn skip_missing(transform: &str, capability: &str) {
    warn!(transform, capability, "page adapter lacks capability, skipping");
}
