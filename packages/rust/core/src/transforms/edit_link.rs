//! Edit-on-host link injection.

use tracing::debug;

use docmesh_shared::{DocumentContext, Result};

use crate::merge::{MergeMode, Patch};
use crate::page::PageAdapter;
use crate::stage::Stage;
use crate::transformer::{Capabilities, Dependencies, Transformer};

use super::{EDIT_LINK_INJECTOR, FRONT_MATTER_BUILDER, skip_missing};

/// Front matter key holding the edit link.
pub const EDIT_URL_KEY: &str = "editURL";

/// Adds an `editURL` pointing at the source file on the repository host.
///
/// Only for repositories with an `edit_url_base`. Authors can still set
/// their own link in the source file.
#[derive(Debug, Clone)]
pub struct EditLinkInjector {
    priority: i32,
}

impl EditLinkInjector {
    pub fn new(priority: i32) -> Self {
        Self { priority }
    }
}

/// `{base}/{branch}/{docs_path}/{path}` with duplicate separators removed.
pub fn edit_url(ctx: &DocumentContext) -> Option<String> {
    let base = ctx.edit_url_base.as_deref()?.trim_end_matches('/');
    if base.is_empty() {
        return None;
    }

    let segments = [ctx.branch.as_str(), ctx.docs_path.as_str(), ctx.path.as_str()];
    let mut url = base.to_string();
    for segment in segments {
        let segment = segment.trim_matches('/');
        if !segment.is_empty() {
            url.push('/');
            url.push_str(segment);
        }
    }
    Some(url)
}

impl Transformer for EditLinkInjector {
    fn name(&self) -> &str {
        EDIT_LINK_INJECTOR
    }

    fn stage(&self) -> &str {
        Stage::Enrich.as_str()
    }

    fn dependencies(&self) -> Dependencies {
        Dependencies::new()
            .after(FRONT_MATTER_BUILDER)
            .with_capabilities(Capabilities {
                modifies_front_matter: true,
                requires_config: true,
                ..Capabilities::default()
            })
    }

    fn transform(&self, page: &mut dyn PageAdapter) -> Result<()> {
        let Some(url) = page.context().and_then(edit_url) else {
            debug!(transform = EDIT_LINK_INJECTOR, "no edit url base, skipping");
            return Ok(());
        };
        match page.as_patches() {
            Some(collector) => collector.add_patch(
                Patch::new(EDIT_LINK_INJECTOR, MergeMode::SetIfMissing, self.priority)
                    .with(EDIT_URL_KEY, url),
            ),
            None => skip_missing(EDIT_LINK_INJECTOR, "patches"),
        }
        Ok(())
    }
}
