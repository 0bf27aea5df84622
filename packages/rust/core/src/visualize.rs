//! Render the computed pipeline order for humans and tools.
//!
//! Read-only: every format is derived from [`Registry::list`], so a registry
//! that fails to build fails to render too.

use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use docmesh_shared::{DocmeshError, Result};

use crate::registry::Registry;
use crate::transformer::Transformer;

/// Output format for [`visualize_pipeline`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VisualizeFormat {
    #[default]
    Text,
    Mermaid,
    Dot,
    Json,
}

impl FromStr for VisualizeFormat {
    type Err = DocmeshError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "mermaid" => Ok(Self::Mermaid),
            "dot" | "graphviz" => Ok(Self::Dot),
            "json" => Ok(Self::Json),
            other => Err(DocmeshError::config(format!(
                "unknown visualize format {other:?}: expected text, mermaid, dot or json"
            ))),
        }
    }
}

/// Render the registry's pipeline order in `format`.
pub fn visualize_pipeline(registry: &Registry, format: VisualizeFormat) -> Result<String> {
    let order = registry.list()?;
    let groups = group_by_stage(order.as_slice());
    let edges = dependency_edges(registry, order.as_slice());

    match format {
        VisualizeFormat::Text => Ok(render_text(&groups)),
        VisualizeFormat::Mermaid => Ok(render_mermaid(&groups, &edges)),
        VisualizeFormat::Dot => Ok(render_dot(&groups, &edges)),
        VisualizeFormat::Json => render_json(order.as_slice(), groups.len()),
    }
}

// ---------------------------------------------------------------------------
// Shared layout
// ---------------------------------------------------------------------------

/// A stage and its transformers, each with its 1-based pipeline position.
struct StageGroup<'a> {
    stage: &'a str,
    members: Vec<(usize, &'a Arc<dyn Transformer>)>,
}

/// Split a stage-monotone order into consecutive per-stage runs.
fn group_by_stage(order: &[Arc<dyn Transformer>]) -> Vec<StageGroup<'_>> {
    let mut groups: Vec<StageGroup<'_>> = Vec::new();
    for (i, transform) in order.iter().enumerate() {
        match groups.last_mut() {
            Some(group) if group.stage == transform.stage() => {
                group.members.push((i + 1, transform));
            }
            _ => groups.push(StageGroup {
                stage: transform.stage(),
                members: vec![(i + 1, transform)],
            }),
        }
    }
    groups
}

/// `(from, to)` pairs meaning "from runs before to", between registered
/// transformers only. Sorted and deduplicated.
fn dependency_edges(registry: &Registry, order: &[Arc<dyn Transformer>]) -> Vec<(String, String)> {
    let mut edges = Vec::new();
    for transform in order {
        let deps = transform.dependencies();
        for dep in &deps.must_run_after {
            if registry.contains(dep) {
                edges.push((dep.clone(), transform.name().to_string()));
            }
        }
        for dep in &deps.must_run_before {
            if registry.contains(dep) {
                edges.push((transform.name().to_string(), dep.clone()));
            }
        }
    }
    edges.sort();
    edges.dedup();
    edges
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

fn render_text(groups: &[StageGroup<'_>]) -> String {
    let total: usize = groups.iter().map(|g| g.members.len()).sum();
    let mut out = format!(
        "Pipeline ({total} transforms across {} stages)\n",
        groups.len()
    );

    for (gi, group) in groups.iter().enumerate() {
        let last_group = gi + 1 == groups.len();
        let (branch, indent) = if last_group {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        let _ = writeln!(out, "{branch}{}", group.stage);

        for (mi, (position, transform)) in group.members.iter().enumerate() {
            let leaf = if mi + 1 == group.members.len() {
                "└── "
            } else {
                "├── "
            };
            let _ = write!(out, "{indent}{leaf}{position}. {}", transform.name());

            let deps = transform.dependencies();
            if !deps.must_run_after.is_empty() {
                let _ = write!(out, " (after: {})", deps.must_run_after.join(", "));
            }
            if !deps.must_run_before.is_empty() {
                let _ = write!(out, " (before: {})", deps.must_run_before.join(", "));
            }
            let flags = deps.capabilities.flags();
            if !flags.is_empty() {
                let _ = write!(out, " [{}]", flags.join(", "));
            }
            out.push('\n');
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Mermaid
// ---------------------------------------------------------------------------

fn mermaid_id(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn render_mermaid(groups: &[StageGroup<'_>], edges: &[(String, String)]) -> String {
    let mut out = String::from("graph TD\n");
    for group in groups {
        let _ = writeln!(out, "    subgraph {}", group.stage);
        for (position, transform) in &group.members {
            let name = transform.name();
            let _ = writeln!(
                out,
                "        {}[\"{position}. {}\"]",
                mermaid_id(name),
                name.replace('"', "'")
            );
        }
        out.push_str("    end\n");
    }
    for (from, to) in edges {
        let _ = writeln!(out, "    {} --> {}", mermaid_id(from), mermaid_id(to));
    }
    out
}

// ---------------------------------------------------------------------------
// DOT
// ---------------------------------------------------------------------------

fn dot_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn render_dot(groups: &[StageGroup<'_>], edges: &[(String, String)]) -> String {
    let mut out = String::from("digraph pipeline {\n    rankdir=TB;\n    node [shape=box];\n");
    for group in groups {
        let _ = writeln!(out, "    subgraph cluster_{} {{", mermaid_id(group.stage));
        let _ = writeln!(out, "        label={};", dot_quote(group.stage));
        for (_, transform) in &group.members {
            let _ = writeln!(out, "        {};", dot_quote(transform.name()));
        }
        out.push_str("    }\n");
    }
    for (from, to) in edges {
        let _ = writeln!(out, "    {} -> {};", dot_quote(from), dot_quote(to));
    }
    out.push_str("}\n");
    out
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonPipeline {
    transforms: Vec<JsonTransform>,
    total_transforms: usize,
    total_stages: usize,
}

#[derive(Serialize)]
struct JsonTransform {
    name: String,
    stage: String,
    order: usize,
    dependencies: JsonDependencies,
    capabilities: Vec<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonDependencies {
    must_run_after: Vec<String>,
    must_run_before: Vec<String>,
}

fn render_json(order: &[Arc<dyn Transformer>], total_stages: usize) -> Result<String> {
    let transforms: Vec<JsonTransform> = order
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let deps = t.dependencies();
            JsonTransform {
                name: t.name().to_string(),
                stage: t.stage().to_string(),
                order: i + 1,
                capabilities: deps.capabilities.flags(),
                dependencies: JsonDependencies {
                    must_run_after: deps.must_run_after,
                    must_run_before: deps.must_run_before,
                },
            }
        })
        .collect();

    let doc = JsonPipeline {
        total_transforms: transforms.len(),
        transforms,
        total_stages,
    };
    serde_json::to_string_pretty(&doc).map_err(|e| DocmeshError::Serialization(e.to_string()))
}
