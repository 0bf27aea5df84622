//! Static dependency diagnostics over a registry.
//!
//! Validation is deliberately more talkative than the builder. It reports
//! every problem it can find, even for sets the builder would reject, and it
//! flags dependencies the builder silently tolerates (missing targets,
//! cross-stage declarations that ordering by rank makes moot).
//!
//! ```rust,ignore
//! let report = validate_dependencies(&registry);
//! if !report.valid {
//!     for err in &report.errors {
//!         eprintln!("error: {err}");
//!     }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use docmesh_shared::DocmeshError;

use crate::builder::sort_stage;
use crate::registry::Registry;
use crate::stage::{Stage, stage_index, valid_stage_names};
use crate::transformer::Transformer;
use crate::transforms::CORE_TRANSFORMS;

// ---------------------------------------------------------------------------
// Issues
// ---------------------------------------------------------------------------

/// Whether an issue blocks a valid pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// Which direction a dependency was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Relation {
    MustRunAfter,
    MustRunBefore,
}

impl Relation {
    fn label(self) -> &'static str {
        match self {
            Relation::MustRunAfter => "mustRunAfter",
            Relation::MustRunBefore => "mustRunBefore",
        }
    }
}

/// One structured finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Issue {
    InvalidStage {
        transform: String,
        stage: String,
    },
    MissingDependency {
        transform: String,
        dependency: String,
        relation: Relation,
    },
    IneffectiveDependency {
        transform: String,
        dependency: String,
        relation: Relation,
        transform_stage: String,
        dependency_stage: String,
    },
    CircularDependency {
        stage: String,
        transforms: Vec<String>,
    },
    BuildFailure {
        message: String,
    },
    EmptyRegistry,
    Unreferenced {
        transform: String,
    },
}

impl Issue {
    pub fn severity(&self) -> Severity {
        match self {
            Issue::InvalidStage { .. }
            | Issue::MissingDependency { .. }
            | Issue::CircularDependency { .. }
            | Issue::BuildFailure { .. } => Severity::Error,
            Issue::IneffectiveDependency { .. } | Issue::EmptyRegistry | Issue::Unreferenced { .. } => {
                Severity::Warning
            }
        }
    }

    /// A fix for the issue, when there is an obvious one.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Issue::InvalidStage { transform, .. } => Some(format!(
                "set the stage of {transform:?} to one of: {}",
                valid_stage_names().join(", ")
            )),
            Issue::MissingDependency {
                transform,
                dependency,
                relation,
            } => Some(format!(
                "register {dependency:?} or remove it from the {} list of {transform:?}",
                relation.label()
            )),
            Issue::IneffectiveDependency {
                transform,
                dependency,
                relation,
                ..
            } => Some(match relation {
                Relation::MustRunAfter => format!(
                    "move {transform:?} to the stage of {dependency:?} or later, or drop the dependency"
                ),
                Relation::MustRunBefore => format!(
                    "move {transform:?} to the stage of {dependency:?} or earlier, or drop the dependency"
                ),
            }),
            Issue::CircularDependency { transforms, .. } => Some(format!(
                "remove one mustRunAfter/mustRunBefore declaration among: {}",
                transforms.join(", ")
            )),
            Issue::EmptyRegistry => {
                Some("register the built-in transforms before building a pipeline".to_string())
            }
            Issue::Unreferenced { transform } => Some(format!(
                "if {transform:?} must run at a particular point, declare it as a dependency of a neighbouring transform"
            )),
            Issue::BuildFailure { .. } => None,
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Issue::InvalidStage { transform, stage } => {
                write!(f, "transform {transform:?} has invalid stage {stage:?}")
            }
            Issue::MissingDependency {
                transform,
                dependency,
                relation,
            } => write!(
                f,
                "transform {transform:?} lists missing transform {dependency:?} in {}",
                relation.label()
            ),
            Issue::IneffectiveDependency {
                transform,
                dependency,
                relation,
                transform_stage,
                dependency_stage,
            } => write!(
                f,
                "transform {transform:?} ({transform_stage}) lists {dependency:?} ({dependency_stage}) in {}, \
                 but stage order already decides; the dependency has no effect",
                relation.label()
            ),
            Issue::CircularDependency { stage, transforms } => write!(
                f,
                "circular dependency in stage {stage}: {}",
                transforms.join(", ")
            ),
            Issue::BuildFailure { message } => write!(f, "pipeline build failed: {message}"),
            Issue::EmptyRegistry => write!(f, "no transforms registered"),
            Issue::Unreferenced { transform } => write!(
                f,
                "transform {transform:?} is not a dependency of any other transform (possibly standalone)"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome of [`validate_dependencies`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// `true` when there are no errors; warnings do not count.
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// The same findings in structured form.
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    fn from_issues(issues: Vec<Issue>) -> Self {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for issue in &issues {
            match issue.severity() {
                Severity::Error => errors.push(issue.to_string()),
                Severity::Warning => warnings.push(issue.to_string()),
            }
        }

        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
            issues,
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Suggested fixes, one per issue that has an obvious one, deduplicated.
    pub fn suggestions(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.issues
            .iter()
            .filter_map(Issue::suggestion)
            .filter(|s| seen.insert(s.clone()))
            .collect()
    }

    /// Convert into an error when the report should gate processing.
    pub fn into_result(self, fail_on_warnings: bool) -> docmesh_shared::Result<Self> {
        if !self.valid {
            return Err(DocmeshError::validation(self.errors.join("; ")));
        }
        if fail_on_warnings && self.has_warnings() {
            return Err(DocmeshError::validation(format!(
                "warnings treated as errors: {}",
                self.warnings.join("; ")
            )));
        }
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check every registered transformer's stage and dependencies.
#[instrument(skip_all, fields(registered = registry.len()))]
pub fn validate_dependencies(registry: &Registry) -> ValidationReport {
    if registry.is_empty() {
        return ValidationReport::from_issues(vec![Issue::EmptyRegistry]);
    }

    let mut issues = Vec::new();

    for transform in registry.transformers() {
        let name = transform.name();
        let stage = transform.stage();
        let rank = stage_index(stage);

        if rank < 0 {
            issues.push(Issue::InvalidStage {
                transform: name.to_string(),
                stage: stage.to_string(),
            });
        }

        let deps = transform.dependencies();
        let declared = deps
            .must_run_after
            .iter()
            .map(|d| (d, Relation::MustRunAfter))
            .chain(deps.must_run_before.iter().map(|d| (d, Relation::MustRunBefore)));

        for (dep_name, relation) in declared {
            let Some(dep) = registry.get(dep_name) else {
                issues.push(Issue::MissingDependency {
                    transform: name.to_string(),
                    dependency: dep_name.clone(),
                    relation,
                });
                continue;
            };

            let dep_rank = stage_index(dep.stage());
            if rank < 0 || dep_rank < 0 {
                continue;
            }

            let ineffective = match relation {
                Relation::MustRunAfter => dep_rank > rank,
                Relation::MustRunBefore => dep_rank < rank,
            };
            if ineffective {
                issues.push(Issue::IneffectiveDependency {
                    transform: name.to_string(),
                    dependency: dep_name.clone(),
                    relation,
                    transform_stage: stage.to_string(),
                    dependency_stage: dep.stage().to_string(),
                });
            }
        }
    }

    issues.extend(stage_cycles(registry));

    match registry.list() {
        Ok(_) => {}
        // Both already reported above, for every stage and transform.
        Err(DocmeshError::CircularDependency { .. } | DocmeshError::InvalidStage { .. }) => {}
        Err(other) => issues.push(Issue::BuildFailure {
            message: other.to_string(),
        }),
    }

    let referenced = referenced_names(registry);
    for transform in registry.transformers() {
        let name = transform.name();
        if !CORE_TRANSFORMS.contains(&name) && !referenced.contains(name) {
            issues.push(Issue::Unreferenced {
                transform: name.to_string(),
            });
        }
    }

    let report = ValidationReport::from_issues(issues);
    debug!(
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "dependency validation complete"
    );
    report
}

/// Sort each valid stage on its own, so one bad stage cannot hide another.
fn stage_cycles(registry: &Registry) -> Vec<Issue> {
    let mut buckets: BTreeMap<Stage, Vec<Arc<dyn Transformer>>> = BTreeMap::new();
    for transform in registry.transformers() {
        if let Some(stage) = transform.resolved_stage() {
            buckets.entry(stage).or_default().push(Arc::clone(transform));
        }
    }

    buckets
        .into_iter()
        .filter_map(|(stage, bucket)| match sort_stage(stage, &bucket) {
            Err(DocmeshError::CircularDependency { stage, transforms }) => {
                Some(Issue::CircularDependency { stage, transforms })
            }
            _ => None,
        })
        .collect()
}

/// Registered names that some other transformer depends on, in either direction.
fn referenced_names(registry: &Registry) -> BTreeSet<String> {
    let mut referenced = BTreeSet::new();
    for transform in registry.transformers() {
        let deps = transform.dependencies();
        for dep in deps.referenced() {
            if dep != transform.name() && registry.contains(dep) {
                referenced.insert(dep.to_string());
            }
        }
    }
    referenced
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::page::PageAdapter;
    use crate::transformer::{Dependencies, Transformer};

    struct Stub {
        name: &'static str,
        stage: &'static str,
        deps: Dependencies,
    }

    impl Transformer for Stub {
        fn name(&self) -> &str {
            self.name
        }
        fn stage(&self) -> &str {
            self.stage
        }
        fn dependencies(&self) -> Dependencies {
            self.deps.clone()
        }
        fn transform(&self, _page: &mut dyn PageAdapter) -> docmesh_shared::Result<()> {
            Ok(())
        }
    }

    fn registry(items: Vec<(&'static str, &'static str, Dependencies)>) -> Registry {
        let mut registry = Registry::new();
        for (name, stage, deps) in items {
            registry.register(Arc::new(Stub { name, stage, deps }));
        }
        registry
    }

    #[test]
    fn empty_registry_warns() {
        let report = validate_dependencies(&Registry::new());
        assert!(report.valid);
        assert_eq!(report.warnings, vec!["no transforms registered"]);
    }

    #[test]
    fn missing_dependency_is_an_error() {
        let reg = registry(vec![("builder", "build", Dependencies::new().after("parser"))]);
        let report = validate_dependencies(&reg);
        assert!(!report.valid);
        assert!(report.errors[0].contains("\"parser\""));
        assert!(report.errors[0].contains("missing transform"));
    }

    #[test]
    fn later_stage_after_dependency_warns() {
        let reg = registry(vec![
            ("early", "parse", Dependencies::new().after("late")),
            ("late", "serialize", Dependencies::new()),
        ]);
        let report = validate_dependencies(&reg);
        assert!(report.valid);
        assert!(report.warnings.iter().any(|w| w.contains("no effect") && w.contains("early")));
    }

    #[test]
    fn earlier_stage_before_dependency_warns() {
        let reg = registry(vec![
            ("late", "serialize", Dependencies::new().before("early")),
            ("early", "parse", Dependencies::new().after("late")),
        ]);
        let report = validate_dependencies(&reg);
        let ineffective = report
            .issues
            .iter()
            .filter(|i| matches!(i, Issue::IneffectiveDependency { .. }))
            .count();
        assert_eq!(ineffective, 2);
    }

    #[test]
    fn consistent_cross_stage_dependency_is_clean() {
        let reg = registry(vec![
            ("a", "parse", Dependencies::new().before("b")),
            ("b", "build", Dependencies::new().after("a")),
        ]);
        let report = validate_dependencies(&reg);
        assert!(report.valid);
        assert!(!report.issues.iter().any(|i| matches!(i, Issue::IneffectiveDependency { .. })));
    }

    #[test]
    fn cycle_is_classified() {
        let reg = registry(vec![
            ("a", "merge", Dependencies::new().after("b")),
            ("b", "merge", Dependencies::new().after("a")),
        ]);
        let report = validate_dependencies(&reg);
        assert!(!report.valid);
        assert!(
            report
                .issues
                .contains(&Issue::CircularDependency {
                    stage: "merge".into(),
                    transforms: vec!["a".into(), "b".into()],
                })
        );
        assert!(report.errors.iter().any(|e| e.starts_with("circular dependency")));
    }

    #[test]
    fn cycle_reported_alongside_invalid_stage() {
        let reg = registry(vec![
            ("a", "merge", Dependencies::new().after("b")),
            ("b", "merge", Dependencies::new().after("a")),
            ("odd", "render", Dependencies::new()),
        ]);
        let report = validate_dependencies(&reg);
        assert_eq!(report.errors.len(), 2, "{:?}", report.errors);
        assert!(report.errors.iter().any(|e| e.contains("invalid stage \"render\"")));
        assert!(report.errors.contains(&"circular dependency in stage merge: a, b".to_string()));
    }

    #[test]
    fn cycles_reported_for_every_stage() {
        let reg = registry(vec![
            ("a", "build", Dependencies::new().after("b")),
            ("b", "build", Dependencies::new().after("a")),
            ("x", "finalize", Dependencies::new().before("y")),
            ("y", "finalize", Dependencies::new().before("x")),
        ]);
        let report = validate_dependencies(&reg);
        let cycles: Vec<&str> = report
            .issues
            .iter()
            .filter_map(|i| match i {
                Issue::CircularDependency { stage, .. } => Some(stage.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(cycles, vec!["build", "finalize"]);
        assert!(!report.issues.iter().any(|i| matches!(i, Issue::BuildFailure { .. })));
    }

    #[test]
    fn invalid_stage_reported_once() {
        let reg = registry(vec![("odd", "render", Dependencies::new())]);
        let report = validate_dependencies(&reg);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("invalid stage"));
    }

    #[test]
    fn unreferenced_non_core_transform_warns() {
        let reg = registry(vec![
            ("front_matter_parser", "parse", Dependencies::new()),
            ("lonely", "transform", Dependencies::new()),
        ]);
        let report = validate_dependencies(&reg);
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("lonely"));
    }

    #[test]
    fn suggestions_cover_common_fixes() {
        let reg = registry(vec![
            ("builder", "build", Dependencies::new().after("parser")),
            ("odd", "render", Dependencies::new().after("builder")),
        ]);
        let suggestions = validate_dependencies(&reg).suggestions();
        assert!(suggestions.iter().any(|s| s.contains("register \"parser\"")));
        assert!(suggestions.iter().any(|s| s.contains("set the stage of \"odd\"")));
    }

    #[test]
    fn into_result_gates_on_warnings_when_asked() {
        let reg = registry(vec![("lonely", "transform", Dependencies::new())]);
        let report = validate_dependencies(&reg);
        assert!(report.clone().into_result(false).is_ok());
        assert!(report.into_result(true).is_err());
    }
}
