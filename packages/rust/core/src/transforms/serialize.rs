//! Final rendering of the page.

use docmesh_shared::Result;

use crate::page::PageAdapter;
use crate::stage::Stage;
use crate::transformer::{Capabilities, Dependencies, Transformer};

use super::{HEADING_STRIPPER, SERIALIZER, skip_missing};

/// Renders merged front matter and body into the output document.
#[derive(Debug, Clone, Copy, Default)]
pub struct Serializer;

impl Transformer for Serializer {
    fn name(&self) -> &str {
        SERIALIZER
    }

    fn stage(&self) -> &str {
        Stage::Serialize.as_str()
    }

    fn dependencies(&self) -> Dependencies {
        Dependencies::new()
            .after(HEADING_STRIPPER)
            .with_capabilities(Capabilities {
                requires_original_front_matter: true,
                ..Capabilities::default()
            })
    }

    fn transform(&self, page: &mut dyn PageAdapter) -> Result<()> {
        match page.as_serializer() {
            Some(serializer) => serializer.serialize(),
            None => {
                skip_missing(SERIALIZER, "serializer");
                Ok(())
            }
        }
    }
}
