//! Core pipeline orchestration and domain logic for docmesh.
//!
//! This crate holds the transform pipeline: the stage model, the
//! [`Registry`] of transformers, per-stage dependency ordering, validation,
//! the page adapter surface, front matter patch merging, execution and
//! visualization, plus the built-in transformers.

pub mod builder;
pub mod merge;
pub mod page;
pub mod pipeline;
pub mod registry;
pub mod stage;
pub mod transformer;
pub mod transforms;
pub mod validation;
pub mod visualize;

pub use builder::{PipelineOrder, build_pipeline};
pub use merge::{ArrayStrategy, MergeMode, Patch, merge_front_matter};
pub use page::{
    ContentHolder, DocumentPage, FrontMatterHolder, PageAdapter, PageSerializer, PatchCollector,
};
pub use pipeline::{
    BatchResult, FailedDocument, Pipeline, ProcessedDocument, ProgressReporter, SilentProgress,
    SourceDocument,
};
pub use registry::{Registry, RegistrySnapshot};
pub use stage::{Stage, is_valid_stage, stage_index, valid_stage_names};
pub use transformer::{Capabilities, Dependencies, Transformer};
pub use validation::{Issue, Relation, Severity, ValidationReport, validate_dependencies};
pub use visualize::{VisualizeFormat, visualize_pipeline};
