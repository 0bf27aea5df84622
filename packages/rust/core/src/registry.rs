//! The set of transformers known to a process.
//!
//! A [`Registry`] is filled once at start-up and then only read. It is a
//! plain value passed to whoever needs it; there is no global instance.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use docmesh_shared::{DocmeshError, PipelineSettings, Result};

use crate::builder::{PipelineOrder, build_pipeline};
use crate::transformer::Transformer;
use crate::transforms;

/// Name-keyed set of transformers. The first registration of a name wins.
#[derive(Clone, Default)]
pub struct Registry {
    transforms: BTreeMap<String, Arc<dyn Transformer>>,
}

/// A saved copy of a registry's contents, restored with [`Registry::restore`].
///
/// Meant for test isolation only.
#[derive(Clone)]
pub struct RegistrySnapshot {
    transforms: BTreeMap<String, Arc<dyn Transformer>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in transformer.
    pub fn with_defaults(settings: &PipelineSettings) -> Result<Self> {
        let mut registry = Self::new();
        for transform in transforms::defaults(settings)? {
            registry.register(transform);
        }
        Ok(registry)
    }

    /// Add a transformer unless its name is already taken.
    ///
    /// Returns `false` when the name was taken; the earlier registration is
    /// kept and the new one dropped.
    pub fn register(&mut self, transform: Arc<dyn Transformer>) -> bool {
        let name = transform.name().to_string();
        if self.transforms.contains_key(&name) {
            warn!(transform = %name, "transform already registered, ignoring duplicate");
            return false;
        }
        debug!(transform = %name, stage = transform.stage(), "registered transform");
        self.transforms.insert(name, transform);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Transformer>> {
        self.transforms.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Registered transformers, sorted by name.
    pub fn transformers(&self) -> impl Iterator<Item = &Arc<dyn Transformer>> {
        self.transforms.values()
    }

    /// The full pipeline order over every registered transformer.
    #[instrument(skip_all, fields(registered = self.transforms.len()))]
    pub fn list(&self) -> Result<PipelineOrder> {
        let all: Vec<Arc<dyn Transformer>> = self.transforms.values().cloned().collect();
        build_pipeline(&all)
    }

    /// The full order restricted to transformers matching `include`.
    ///
    /// The full set is ordered first, so construction errors anywhere in the
    /// registry still surface. Fails if `include` matches nothing.
    pub fn build_pipeline_with_filter(
        &self,
        include: impl Fn(&dyn Transformer) -> bool,
    ) -> Result<PipelineOrder> {
        let filtered = self.list()?.retain(include);
        if filtered.is_empty() {
            return Err(DocmeshError::EmptyFilter);
        }
        Ok(filtered)
    }

    /// Copy the current contents.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            transforms: self.transforms.clone(),
        }
    }

    /// Swap the contents back to a snapshot.
    pub fn restore(&mut self, snapshot: RegistrySnapshot) {
        self.transforms = snapshot.transforms;
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("transforms", &self.transforms.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageAdapter;
    use crate::transformer::Dependencies;

    struct Stub {
        name: &'static str,
        stage: &'static str,
        after: Option<&'static str>,
    }

    impl Transformer for Stub {
        fn name(&self) -> &str {
            self.name
        }
        fn stage(&self) -> &str {
            self.stage
        }
        fn dependencies(&self) -> Dependencies {
            match self.after {
                Some(dep) => Dependencies::new().after(dep),
                None => Dependencies::new(),
            }
        }
        fn transform(&self, _page: &mut dyn PageAdapter) -> Result<()> {
            Ok(())
        }
    }

    fn stub(
        name: &'static str,
        stage: &'static str,
        after: Option<&'static str>,
    ) -> Arc<dyn Transformer> {
        Arc::new(Stub { name, stage, after })
    }

    fn scenario() -> Registry {
        let mut registry = Registry::new();
        registry.register(stub("merge", "merge", Some("builder")));
        registry.register(stub("builder", "build", Some("parser")));
        registry.register(stub("parser", "parse", None));
        registry
    }

    #[test]
    fn list_orders_by_stage() {
        let order = scenario().list().unwrap();
        assert_eq!(order.names(), vec!["parser", "builder", "merge"]);
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let mut registry = Registry::new();
        assert!(registry.register(stub("parser", "parse", None)));
        assert!(!registry.register(stub("parser", "serialize", None)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("parser").unwrap().stage(), "parse");
    }

    #[test]
    fn filter_keeps_full_order() {
        let order = scenario()
            .build_pipeline_with_filter(|t| t.name() != "builder")
            .unwrap();
        assert_eq!(order.names(), vec!["parser", "merge"]);
    }

    #[test]
    fn filter_matching_nothing_errors() {
        let err = scenario()
            .build_pipeline_with_filter(|_| false)
            .unwrap_err();
        assert!(matches!(err, DocmeshError::EmptyFilter));
    }

    #[test]
    fn filter_still_reports_construction_errors() {
        let mut registry = scenario();
        registry.register(stub("broken", "render", None));
        let err = registry
            .build_pipeline_with_filter(|t| t.name() == "parser")
            .unwrap_err();
        assert!(matches!(err, DocmeshError::InvalidStage { .. }));
    }

    #[test]
    fn snapshot_restore_round_trips() {
        let mut registry = scenario();
        let snapshot = registry.snapshot();

        registry.register(stub("extra", "finalize", None));
        assert_eq!(registry.len(), 4);

        registry.restore(snapshot);
        assert_eq!(registry.len(), 3);
        assert!(!registry.contains("extra"));
    }

    #[test]
    fn empty_registry_lists_nothing() {
        let order = Registry::new().list().unwrap();
        assert!(order.is_empty());
    }
}
