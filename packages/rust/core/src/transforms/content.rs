//! Body rewrites run after front matter is final.

use serde_json::Value;

use docmesh_shared::Result;

use crate::page::PageAdapter;
use crate::stage::Stage;
use crate::transformer::{Capabilities, Dependencies, Transformer};

use super::{FRONT_MATTER_MERGE, HEADING_STRIPPER, RELATIVE_LINK_REWRITER, skip_missing};

// ---------------------------------------------------------------------------
// Relative links
// ---------------------------------------------------------------------------

/// Rewrites links between markdown files into site URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelativeLinkRewriter;

impl Transformer for RelativeLinkRewriter {
    fn name(&self) -> &str {
        RELATIVE_LINK_REWRITER
    }

    fn stage(&self) -> &str {
        Stage::Transform.as_str()
    }

    fn dependencies(&self) -> Dependencies {
        Dependencies::new()
            .after(FRONT_MATTER_MERGE)
            .with_capabilities(Capabilities {
                modifies_content: true,
                requires_file_metadata: true,
                ..Capabilities::default()
            })
    }

    fn transform(&self, page: &mut dyn PageAdapter) -> Result<()> {
        let Some(path) = page.context().map(|ctx| ctx.path.clone()) else {
            skip_missing(RELATIVE_LINK_REWRITER, "context");
            return Ok(());
        };
        match page.as_content() {
            Some(content) => {
                let rewritten = docmesh_markdown::rewrite_relative_links(content.content(), &path);
                content.set_content(rewritten);
            }
            None => skip_missing(RELATIVE_LINK_REWRITER, "content"),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Duplicate title heading
// ---------------------------------------------------------------------------

/// Drops a leading H1 that repeats the front matter title.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadingStripper;

impl Transformer for HeadingStripper {
    fn name(&self) -> &str {
        HEADING_STRIPPER
    }

    fn stage(&self) -> &str {
        Stage::Finalize.as_str()
    }

    fn dependencies(&self) -> Dependencies {
        Dependencies::new()
            .after(RELATIVE_LINK_REWRITER)
            .with_capabilities(Capabilities {
                modifies_content: true,
                ..Capabilities::default()
            })
    }

    fn transform(&self, page: &mut dyn PageAdapter) -> Result<()> {
        let Some(holder) = page.as_front_matter() else {
            skip_missing(HEADING_STRIPPER, "front_matter");
            return Ok(());
        };
        let Some(Value::String(title)) = holder.front_matter().get("title").cloned() else {
            return Ok(());
        };
        match page.as_content() {
            Some(content) => {
                let stripped = docmesh_markdown::strip_leading_title(content.content(), &title);
                content.set_content(stripped);
            }
            None => skip_missing(HEADING_STRIPPER, "content"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{ContentHolder, DocumentPage, FrontMatterHolder};
    use crate::transforms::test_support::ContentOnlyPage;
    use docmesh_shared::{DocumentContext, FrontMatter};
    use serde_json::json;

    fn ctx(path: &str) -> DocumentContext {
        DocumentContext {
            path: path.into(),
            ..DocumentContext::default()
        }
    }

    #[test]
    fn rewrites_links_on_content_only_adapter() {
        let mut page = ContentOnlyPage {
            content: "See [setup](setup.md).\n".into(),
            context: Some(ctx("guide/install.md")),
        };
        RelativeLinkRewriter.transform(&mut page).unwrap();
        assert_eq!(page.content, "See [setup](../setup/).\n");
    }

    #[test]
    fn link_rewriter_needs_context() {
        let mut page = ContentOnlyPage {
            content: "See [setup](setup.md).\n".into(),
            context: None,
        };
        RelativeLinkRewriter.transform(&mut page).unwrap();
        assert_eq!(page.content, "See [setup](setup.md).\n");
    }

    #[test]
    fn strips_heading_matching_title() {
        let mut page = DocumentPage::new(ctx("install.md"), "# Install\n\nSteps.\n");
        let mut fm = FrontMatter::new();
        fm.insert("title".into(), json!("Install"));
        page.set_front_matter(fm);

        HeadingStripper.transform(&mut page).unwrap();
        assert_eq!(ContentHolder::content(&page), "Steps.\n");
    }

    #[test]
    fn keeps_heading_without_title() {
        let mut page = DocumentPage::new(ctx("install.md"), "# Install\n\nSteps.\n");
        HeadingStripper.transform(&mut page).unwrap();
        assert_eq!(ContentHolder::content(&page), "# Install\n\nSteps.\n");
    }

    #[test]
    fn heading_stripper_skips_content_only_adapter() {
        let mut page = ContentOnlyPage {
            content: "# Install\n".into(),
            context: None,
        };
        HeadingStripper.transform(&mut page).unwrap();
        assert_eq!(page.content, "# Install\n");
    }
}
