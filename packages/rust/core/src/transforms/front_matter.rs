//! Front matter transformers: parse, contribute, merge.

use serde_json::Value;
use tracing::debug;

use docmesh_shared::{DocumentContext, Result};

use crate::merge::{ArrayStrategy, MergeMode, Patch, merge_front_matter};
use crate::page::PageAdapter;
use crate::stage::Stage;
use crate::transformer::{Capabilities, Dependencies, Transformer};

use super::{
    EDIT_LINK_INJECTOR, FRONT_MATTER_BUILDER, FRONT_MATTER_MERGE, FRONT_MATTER_PARSER, skip_missing,
};

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Splits the source text into original front matter and body.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontMatterParser;

impl Transformer for FrontMatterParser {
    fn name(&self) -> &str {
        FRONT_MATTER_PARSER
    }

    fn stage(&self) -> &str {
        Stage::Parse.as_str()
    }

    fn dependencies(&self) -> Dependencies {
        Dependencies::new().with_capabilities(Capabilities {
            modifies_content: true,
            modifies_front_matter: true,
            ..Capabilities::default()
        })
    }

    fn transform(&self, page: &mut dyn PageAdapter) -> Result<()> {
        let Some(source) = page.as_content().map(|c| c.content().to_string()) else {
            skip_missing(FRONT_MATTER_PARSER, "content");
            return Ok(());
        };
        if page.as_front_matter().is_none() {
            skip_missing(FRONT_MATTER_PARSER, "front_matter");
            return Ok(());
        }

        let split = docmesh_markdown::split_front_matter(&source)?;

        if let Some(holder) = page.as_front_matter() {
            holder.set_original_front_matter(split.front_matter, split.had_front_matter);
        }
        if let Some(content) = page.as_content() {
            content.set_content(split.body);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Front matter key holding the repository's home page.
pub const REPOSITORY_URL_KEY: &str = "repositoryURL";

/// Contributes the base metadata every published page needs.
///
/// Two patches at the configured priority: a set-if-missing one for values
/// an author may override in the source (`title`, `section`, `date`), and a
/// deep one for values owned by the aggregator (`repository`,
/// `repositoryURL`, `tags`).
#[derive(Debug, Clone)]
pub struct FrontMatterBuilder {
    priority: i32,
    tags_strategy: ArrayStrategy,
}

impl FrontMatterBuilder {
    pub fn new(priority: i32, tags_strategy: ArrayStrategy) -> Self {
        Self {
            priority,
            tags_strategy,
        }
    }

    fn defaults_patch(&self, ctx: &DocumentContext, body: &str) -> Patch {
        let title = docmesh_markdown::extract_title(body)
            .unwrap_or_else(|| docmesh_markdown::title_from_path(&ctx.path));

        let mut patch = Patch::new(FRONT_MATTER_BUILDER, MergeMode::SetIfMissing, self.priority)
            .with("title", title);
        if !ctx.section().is_empty() {
            patch = patch.with("section", ctx.section());
        }
        if let Some(modified) = ctx.last_modified {
            patch = patch.with("date", modified.to_rfc3339());
        }
        patch
    }

    fn owned_patch(&self, ctx: &DocumentContext) -> Patch {
        let mut patch = Patch::new(FRONT_MATTER_BUILDER, MergeMode::Deep, self.priority)
            .with_array_strategy(self.tags_strategy);
        if !ctx.repository.is_empty() {
            patch = patch.with("repository", ctx.repository.as_str());
        }
        if let Some(url) = ctx.repository_url.as_deref().filter(|u| !u.is_empty()) {
            patch = patch.with(REPOSITORY_URL_KEY, url);
        }
        if !ctx.tags.is_empty() {
            let tags: Vec<Value> = ctx.tags.iter().map(|t| Value::from(t.as_str())).collect();
            patch = patch.with("tags", tags);
        }
        patch
    }
}

impl Transformer for FrontMatterBuilder {
    fn name(&self) -> &str {
        FRONT_MATTER_BUILDER
    }

    fn stage(&self) -> &str {
        Stage::Build.as_str()
    }

    fn dependencies(&self) -> Dependencies {
        Dependencies::new()
            .after(FRONT_MATTER_PARSER)
            .with_capabilities(Capabilities {
                modifies_front_matter: true,
                requires_config: true,
                requires_file_metadata: true,
                ..Capabilities::default()
            })
    }

    fn transform(&self, page: &mut dyn PageAdapter) -> Result<()> {
        let Some(ctx) = page.context().cloned() else {
            skip_missing(FRONT_MATTER_BUILDER, "context");
            return Ok(());
        };
        let body = page
            .as_content()
            .map(|c| c.content().to_string())
            .unwrap_or_default();
        let Some(collector) = page.as_patches() else {
            skip_missing(FRONT_MATTER_BUILDER, "patches");
            return Ok(());
        };

        collector.add_patch(self.defaults_patch(&ctx, &body));
        let owned = self.owned_patch(&ctx);
        if !owned.is_empty() {
            collector.add_patch(owned);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Folds every pending patch over the original front matter.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontMatterMerge;

impl Transformer for FrontMatterMerge {
    fn name(&self) -> &str {
        FRONT_MATTER_MERGE
    }

    fn stage(&self) -> &str {
        Stage::Merge.as_str()
    }

    fn dependencies(&self) -> Dependencies {
        Dependencies::new()
            .after(EDIT_LINK_INJECTOR)
            .with_capabilities(Capabilities {
                requires_original_front_matter: true,
                modifies_front_matter: true,
                ..Capabilities::default()
            })
    }

    fn transform(&self, page: &mut dyn PageAdapter) -> Result<()> {
        let Some(base) = page
            .as_front_matter()
            .map(|h| h.original_front_matter().clone())
        else {
            skip_missing(FRONT_MATTER_MERGE, "front_matter");
            return Ok(());
        };
        let Some(patches) = page.as_patches().map(|c| c.take_patches()) else {
            skip_missing(FRONT_MATTER_MERGE, "patches");
            return Ok(());
        };

        let merged = merge_front_matter(&base, &patches);
        debug!(patches = patches.len(), keys = merged.len(), "front matter merged");

        if let Some(holder) = page.as_front_matter() {
            holder.set_front_matter(merged);
        }
        Ok(())
    }
}
