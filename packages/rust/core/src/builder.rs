//! Pipeline construction: stage ranking plus a per-stage topological sort.
//!
//! The two levels stay separate. [`build_pipeline`] buckets transformers by
//! stage and concatenates the buckets in rank order; [`sort_stage`] orders
//! one bucket. Dependencies naming a transformer in another stage never
//! become edges, so a declared dependency can never pull a transformer out
//! of its stage.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, instrument};

use docmesh_shared::{DocmeshError, Result};

use crate::stage::Stage;
use crate::transformer::Transformer;

// ---------------------------------------------------------------------------
// PipelineOrder
// ---------------------------------------------------------------------------

/// The resolved execution order. Immutable once built.
#[derive(Clone, Default)]
pub struct PipelineOrder {
    transforms: Vec<Arc<dyn Transformer>>,
}

impl PipelineOrder {
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Transformer>> {
        self.transforms.iter()
    }

    pub fn as_slice(&self) -> &[Arc<dyn Transformer>] {
        &self.transforms
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Transformer names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    /// Position of `name` in the order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.transforms.iter().position(|t| t.name() == name)
    }

    /// Keep only the transformers matching `include`, preserving order.
    pub(crate) fn retain(self, include: impl Fn(&dyn Transformer) -> bool) -> Self {
        Self {
            transforms: self
                .transforms
                .into_iter()
                .filter(|t| include(t.as_ref()))
                .collect(),
        }
    }
}

impl std::fmt::Debug for PipelineOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<'a> IntoIterator for &'a PipelineOrder {
    type Item = &'a Arc<dyn Transformer>;
    type IntoIter = std::slice::Iter<'a, Arc<dyn Transformer>>;

    fn into_iter(self) -> Self::IntoIter {
        self.transforms.iter()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Order `transforms` by stage rank, then by dependencies within each stage.
///
/// Fails on an invalid stage, a duplicate name, or a same-stage cycle. The
/// result depends only on the set of transformers, not on their input order.
#[instrument(skip_all, fields(transforms = transforms.len()))]
pub fn build_pipeline(transforms: &[Arc<dyn Transformer>]) -> Result<PipelineOrder> {
    let mut seen = BTreeSet::new();
    let mut buckets: BTreeMap<Stage, Vec<Arc<dyn Transformer>>> = BTreeMap::new();

    for transform in transforms {
        if !seen.insert(transform.name()) {
            return Err(DocmeshError::DuplicateTransform {
                name: transform.name().to_string(),
            });
        }

        let stage = transform
            .resolved_stage()
            .ok_or_else(|| DocmeshError::InvalidStage {
                transform: transform.name().to_string(),
                stage: transform.stage().to_string(),
            })?;

        buckets.entry(stage).or_default().push(Arc::clone(transform));
    }

    let mut ordered = Vec::with_capacity(transforms.len());
    for stage in Stage::ALL {
        let Some(bucket) = buckets.get(&stage) else {
            continue;
        };
        let sorted = sort_stage(stage, bucket)?;
        debug!(%stage, order = ?sorted.iter().map(|t| t.name()).collect::<Vec<_>>(), "stage sorted");
        ordered.extend(sorted);
    }

    Ok(PipelineOrder { transforms: ordered })
}

/// Topologically sort the transformers of one stage (Kahn's algorithm).
///
/// Ready transformers are taken in alphabetical order, so ties never depend
/// on input order. Dependencies on names outside `bucket` are ignored here.
pub fn sort_stage(
    stage: Stage,
    bucket: &[Arc<dyn Transformer>],
) -> Result<Vec<Arc<dyn Transformer>>> {
    let by_name: BTreeMap<&str, &Arc<dyn Transformer>> =
        bucket.iter().map(|t| (t.name(), t)).collect();

    let mut successors: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut in_degree: BTreeMap<String, usize> =
        by_name.keys().map(|name| (name.to_string(), 0)).collect();

    let mut add_edge = |from: &str, to: &str| {
        if successors
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string())
        {
            *in_degree.entry(to.to_string()).or_default() += 1;
        }
    };

    for transform in bucket {
        let deps = transform.dependencies();
        let name = transform.name();

        for dep in &deps.must_run_after {
            if by_name.contains_key(dep.as_str()) {
                add_edge(dep, name);
            }
        }
        for dep in &deps.must_run_before {
            if by_name.contains_key(dep.as_str()) {
                add_edge(name, dep);
            }
        }
    }

    let mut ready: BTreeSet<String> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| name.clone())
        .collect();

    let mut sorted = Vec::with_capacity(bucket.len());
    while let Some(name) = ready.pop_first() {
        if let Some(next) = successors.get(&name) {
            for succ in next {
                if let Some(degree) = in_degree.get_mut(succ) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(succ.clone());
                    }
                }
            }
        }
        if let Some(transform) = by_name.get(name.as_str()) {
            sorted.push(Arc::clone(transform));
        }
    }

    if sorted.len() < by_name.len() {
        let visited: BTreeSet<&str> = sorted.iter().map(|t| t.name()).collect();
        let transforms = by_name
            .keys()
            .filter(|name| !visited.contains(*name))
            .map(|name| name.to_string())
            .collect();
        return Err(DocmeshError::CircularDependency {
            stage: stage.to_string(),
            transforms,
        });
    }

    Ok(sorted)
}
