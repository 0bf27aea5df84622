//! End-to-end scenarios over the public API.

use std::sync::Arc;

use serde_json::json;

use docmesh_core::*;
use docmesh_shared::{DocmeshError, DocumentContext, PipelineSettings, Result};

struct Named {
    name: &'static str,
    stage: &'static str,
    deps: Dependencies,
}

impl Transformer for Named {
    fn name(&self) -> &str {
        self.name
    }
    fn stage(&self) -> &str {
        self.stage
    }
    fn dependencies(&self) -> Dependencies {
        self.deps.clone()
    }
    fn transform(&self, _page: &mut dyn PageAdapter) -> Result<()> {
        Ok(())
    }
}

fn named(name: &'static str, stage: &'static str, deps: Dependencies) -> Arc<dyn Transformer> {
    Arc::new(Named { name, stage, deps })
}

fn three_stage_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(named("parser", "parse", Dependencies::new()));
    registry.register(named("builder", "build", Dependencies::new().after("parser")));
    registry.register(named("merge", "merge", Dependencies::new().after("builder")));
    registry
}

#[test]
fn list_returns_stage_order() {
    let order = three_stage_registry().list().unwrap();
    assert_eq!(order.names(), vec!["parser", "builder", "merge"]);
}

#[test]
fn missing_dependency_builds_but_fails_validation() {
    let mut registry = Registry::new();
    registry.register(named("builder", "build", Dependencies::new().after("parser")));
    registry.register(named("merge", "merge", Dependencies::new().after("builder")));

    let order = registry.list().unwrap();
    assert_eq!(order.names(), vec!["builder", "merge"]);

    let report = validate_dependencies(&registry);
    assert!(!report.valid);
    assert!(report.errors.iter().any(|e| e.contains("parser")));
}

#[test]
fn same_stage_cycle_names_both_transforms() {
    let set = vec![
        named("alpha", "transform", Dependencies::new().after("beta")),
        named("beta", "transform", Dependencies::new().after("alpha")),
    ];
    let err = build_pipeline(&set).unwrap_err();
    assert!(err.is_cycle());
    let message = err.to_string();
    assert!(message.contains("alpha"), "{message}");
    assert!(message.contains("beta"), "{message}");
}

#[test]
fn must_run_before_orders_within_stage() {
    let set = vec![
        named("zeta", "finalize", Dependencies::new().before("alpha")),
        named("alpha", "finalize", Dependencies::new()),
        named("mid", "finalize", Dependencies::new()),
    ];
    let order = build_pipeline(&set).unwrap();
    assert_eq!(order.names(), vec!["mid", "zeta", "alpha"]);
}

#[test]
fn cross_stage_cycle_is_not_an_error() {
    let set = vec![
        named("early", "parse", Dependencies::new().after("late")),
        named("late", "serialize", Dependencies::new().after("early")),
    ];
    let order = build_pipeline(&set).unwrap();
    assert_eq!(order.names(), vec!["early", "late"]);
}

#[test]
fn default_pipeline_end_to_end() {
    let settings = PipelineSettings::default();
    let registry = Registry::with_defaults(&settings).unwrap();
    assert!(validate_dependencies(&registry).into_result(true).is_ok());

    let pipeline = Pipeline::from_registry(&registry, &settings).unwrap();
    let ctx = DocumentContext {
        path: "guide/README.md".into(),
        repository: "engine".into(),
        section: Some("platform".into()),
        branch: "main".into(),
        docs_path: "docs".into(),
        tags: vec!["runtime".into(), "guide".into()],
        ..DocumentContext::default()
    };
    let source = "---\ntitle: Engine Guide\ntags: [guide]\n---\n\n\
                  # Overview\n\nRead [install](./install.md#linux) and [home](../index.md).\n";

    let mut page = DocumentPage::new(ctx.clone(), source);
    pipeline.run(&mut page, &ctx.id()).unwrap();

    let fm = FrontMatterHolder::front_matter(&page);
    assert_eq!(fm["title"], json!("Engine Guide"));
    assert_eq!(fm["section"], json!("platform"));
    assert_eq!(fm["tags"], json!(["guide", "runtime"]));
    assert!(fm.get("editURL").is_none());

    // Landing page: links need no `../` prefix; heading differs from title.
    assert_eq!(
        ContentHolder::content(&page),
        "# Overview\n\nRead [install](install/#linux) and [home](../).\n"
    );
    assert!(page.output().unwrap().starts_with("---\n"));
}

#[test]
fn runtime_failure_names_document_and_transform() {
    let settings = PipelineSettings::default();
    let registry = Registry::with_defaults(&settings).unwrap();
    let pipeline = Pipeline::from_registry(&registry, &settings).unwrap();

    let ctx = DocumentContext {
        path: "broken.md".into(),
        repository: "engine".into(),
        ..DocumentContext::default()
    };
    let err = pipeline.process(ctx, "---\n- a\n- b\n---\nBody\n").unwrap_err();
    assert!(matches!(
        &err,
        DocmeshError::Transform { document, transform, .. }
            if document == "engine:broken.md" && transform == "front_matter_parser"
    ));
}

#[test]
fn registry_snapshot_isolates_test_registrations() {
    let mut registry = three_stage_registry();
    let snapshot = registry.snapshot();
    registry.register(named("temp", "enrich", Dependencies::new()));
    assert_eq!(registry.list().unwrap().len(), 4);

    registry.restore(snapshot);
    assert_eq!(registry.list().unwrap().names(), vec!["parser", "builder", "merge"]);
}
