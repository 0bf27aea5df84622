//! The page adapter: what a transformer may see and change of one document.
//!
//! Capabilities are split into narrow traits. An adapter exposes the ones it
//! supports through the `as_*` accessors on [`PageAdapter`]; everything else
//! returns `None`, and transformers that need a missing capability skip the
//! document instead of failing.

use docmesh_shared::{DocumentContext, DocumentId, FrontMatter, Result};

use crate::merge::Patch;

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Read and replace the document body.
pub trait ContentHolder {
    fn content(&self) -> &str;
    fn set_content(&mut self, content: String);
}

/// Original and merged front matter.
pub trait FrontMatterHolder {
    /// Front matter as found in the source file.
    fn original_front_matter(&self) -> &FrontMatter;

    /// Whether the source file carried a front matter block.
    fn had_front_matter(&self) -> bool;

    fn set_original_front_matter(&mut self, front_matter: FrontMatter, had_front_matter: bool);

    /// The merged front matter, or the original one before merging ran.
    fn front_matter(&self) -> &FrontMatter;

    /// Store the merge result.
    fn set_front_matter(&mut self, front_matter: FrontMatter);
}

/// Collect front matter patches for the merge stage.
pub trait PatchCollector {
    fn add_patch(&mut self, patch: Patch);

    /// Patches in contribution order.
    fn patches(&self) -> &[Patch];

    /// Remove and return every pending patch.
    fn take_patches(&mut self) -> Vec<Patch>;
}

/// Produce the final output bytes. Only the serialize stage calls this.
pub trait PageSerializer {
    fn serialize(&mut self) -> Result<()>;
    fn output(&self) -> Option<&str>;
}

/// The surface threaded through every transformer for one document.
pub trait PageAdapter {
    fn as_content(&mut self) -> Option<&mut dyn ContentHolder> {
        None
    }

    fn as_front_matter(&mut self) -> Option<&mut dyn FrontMatterHolder> {
        None
    }

    fn as_patches(&mut self) -> Option<&mut dyn PatchCollector> {
        None
    }

    fn as_serializer(&mut self) -> Option<&mut dyn PageSerializer> {
        None
    }

    /// Source context supplied by the document source.
    fn context(&self) -> Option<&DocumentContext> {
        None
    }
}

// ---------------------------------------------------------------------------
// DocumentPage
// ---------------------------------------------------------------------------

/// The full-featured adapter used for real documents.
///
/// Owned by exactly one pipeline run; never shared across documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentPage {
    context: DocumentContext,
    content: String,
    original_front_matter: FrontMatter,
    had_front_matter: bool,
    merged_front_matter: Option<FrontMatter>,
    patches: Vec<Patch>,
    output: Option<String>,
}

impl DocumentPage {
    /// A page holding the raw source text, ready for the parse stage.
    pub fn new(context: DocumentContext, source: impl Into<String>) -> Self {
        Self {
            context,
            content: source.into(),
            ..Self::default()
        }
    }

    pub fn id(&self) -> DocumentId {
        self.context.id()
    }

    /// Consume the page, returning the serialized document if serialization ran.
    pub fn into_output(self) -> Option<String> {
        self.output
    }
}

impl ContentHolder for DocumentPage {
    fn content(&self) -> &str {
        &self.content
    }

    fn set_content(&mut self, content: String) {
        self.content = content;
    }
}

impl FrontMatterHolder for DocumentPage {
    fn original_front_matter(&self) -> &FrontMatter {
        &self.original_front_matter
    }

    fn had_front_matter(&self) -> bool {
        self.had_front_matter
    }

    fn set_original_front_matter(&mut self, front_matter: FrontMatter, had_front_matter: bool) {
        self.original_front_matter = front_matter;
        self.had_front_matter = had_front_matter;
    }

    fn front_matter(&self) -> &FrontMatter {
        self.merged_front_matter
            .as_ref()
            .unwrap_or(&self.original_front_matter)
    }

    fn set_front_matter(&mut self, front_matter: FrontMatter) {
        self.merged_front_matter = Some(front_matter);
    }
}

impl PatchCollector for DocumentPage {
    fn add_patch(&mut self, patch: Patch) {
        self.patches.push(patch);
    }

    fn patches(&self) -> &[Patch] {
        &self.patches
    }

    fn take_patches(&mut self) -> Vec<Patch> {
        std::mem::take(&mut self.patches)
    }
}

impl PageSerializer for DocumentPage {
    fn serialize(&mut self) -> Result<()> {
        let rendered = docmesh_markdown::render_document(
            FrontMatterHolder::front_matter(self),
            &self.content,
        )?;
        self.output = Some(rendered);
        Ok(())
    }

    fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }
}

impl PageAdapter for DocumentPage {
    fn as_content(&mut self) -> Option<&mut dyn ContentHolder> {
        Some(self)
    }

    fn as_front_matter(&mut self) -> Option<&mut dyn FrontMatterHolder> {
        Some(self)
    }

    fn as_patches(&mut self) -> Option<&mut dyn PatchCollector> {
        Some(self)
    }

    fn as_serializer(&mut self) -> Option<&mut dyn PageSerializer> {
        Some(self)
    }

    fn context(&self) -> Option<&DocumentContext> {
        Some(&self.context)
    }
}
