//! Front matter patches and the engine that merges them.
//!
//! Transformers never write a document's final front matter directly. They
//! contribute [`Patch`]es; the merge stage folds all of them over the
//! document's original front matter in priority order.
//!
//! Map values merge one level deep only. Below that, the later value
//! replaces the earlier one wholesale.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, trace};

use docmesh_shared::{DocmeshError, FrontMatter};

// ---------------------------------------------------------------------------
// Patch types
// ---------------------------------------------------------------------------

/// How a patch's keys combine with the accumulated result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Merge maps one level, combine string lists, otherwise override.
    #[default]
    Deep,
    /// Overwrite the key outright.
    Replace,
    /// Only fill in keys (and first-level sub-keys) that are absent.
    SetIfMissing,
}

/// How two string lists combine under [`MergeMode::Deep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayStrategy {
    /// The patch list wins.
    #[default]
    Replace,
    /// Existing then new items, duplicates dropped, first occurrence kept.
    Union,
    /// Existing then new items, duplicates kept.
    Append,
}

impl FromStr for ArrayStrategy {
    type Err = DocmeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(Self::Replace),
            "union" => Ok(Self::Union),
            "append" => Ok(Self::Append),
            other => Err(DocmeshError::config(format!(
                "unknown array strategy {other:?}: expected replace, union or append"
            ))),
        }
    }
}

/// A prioritized bundle of proposed front matter changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Who contributed the patch (usually a transformer name).
    pub source: String,
    pub mode: MergeMode,
    /// Lower priorities apply first; the highest priority has the last word.
    pub priority: i32,
    pub data: FrontMatter,
    pub array_strategy: ArrayStrategy,
}

impl Patch {
    pub fn new(source: impl Into<String>, mode: MergeMode, priority: i32) -> Self {
        Self {
            source: source.into(),
            mode,
            priority,
            data: FrontMatter::new(),
            array_strategy: ArrayStrategy::default(),
        }
    }

    /// Add one key to the patch.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_array_strategy(mut self, strategy: ArrayStrategy) -> Self {
        self.array_strategy = strategy;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Merge engine
// ---------------------------------------------------------------------------

/// Fold `patches` over a copy of `base`.
///
/// Patches are applied by ascending priority. Equal priorities keep their
/// contribution order, so the result depends only on the patch list.
/// Type mismatches never fail: the patch value wins.
#[instrument(skip_all, fields(base_keys = base.len(), patches = patches.len()))]
pub fn merge_front_matter(base: &FrontMatter, patches: &[Patch]) -> FrontMatter {
    let mut result = base.clone();

    let mut ordered: Vec<&Patch> = patches.iter().collect();
    ordered.sort_by_key(|p| p.priority);

    for patch in ordered {
        trace!(source = %patch.source, mode = ?patch.mode, priority = patch.priority, "applying patch");
        apply_patch(&mut result, patch);
    }

    result
}

/// Apply one patch to the accumulating result.
pub fn apply_patch(result: &mut FrontMatter, patch: &Patch) {
    for (key, value) in &patch.data {
        match patch.mode {
            MergeMode::Replace => {
                result.insert(key.clone(), value.clone());
            }
            MergeMode::SetIfMissing => set_if_missing(result, key, value),
            MergeMode::Deep => deep_merge(result, key, value, patch.array_strategy),
        }
    }
}

fn set_if_missing(result: &mut FrontMatter, key: &str, value: &Value) {
    match (result.get_mut(key), value) {
        (None, _) => {
            result.insert(key.to_string(), value.clone());
        }
        (Some(Value::Object(existing)), Value::Object(incoming)) => {
            for (sub_key, sub_value) in incoming {
                if !existing.contains_key(sub_key) {
                    existing.insert(sub_key.clone(), sub_value.clone());
                }
            }
        }
        (Some(_), _) => {}
    }
}

fn deep_merge(result: &mut FrontMatter, key: &str, value: &Value, strategy: ArrayStrategy) {
    let Some(existing) = result.get_mut(key) else {
        result.insert(key.to_string(), value.clone());
        return;
    };

    if let (Value::Object(current), Value::Object(incoming)) = (&mut *existing, value) {
        // One level only: nested maps are replaced, not merged.
        for (sub_key, sub_value) in incoming {
            current.insert(sub_key.clone(), sub_value.clone());
        }
        return;
    }

    if is_string_list(existing) && is_string_list(value) {
        let incoming = value.as_array().map(Vec::as_slice).unwrap_or_default();
        let merged = merge_string_lists(existing, incoming, strategy);
        *existing = Value::Array(merged);
        return;
    }

    *existing = value.clone();
}

/// Whether `value` is a list made only of strings (empty lists count).
fn is_string_list(value: &Value) -> bool {
    matches!(value, Value::Array(items) if items.iter().all(Value::is_string))
}

fn merge_string_lists(existing: &Value, incoming: &[Value], strategy: ArrayStrategy) -> Vec<Value> {
    let existing = existing.as_array().map(Vec::as_slice).unwrap_or_default();

    match strategy {
        ArrayStrategy::Replace => incoming.to_vec(),
        ArrayStrategy::Append => existing.iter().chain(incoming).cloned().collect(),
        ArrayStrategy::Union => {
            let mut seen = std::collections::BTreeSet::new();
            existing
                .iter()
                .chain(incoming)
                .filter(|item| seen.insert(item.as_str().unwrap_or_default().to_string()))
                .cloned()
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fm(value: Value) -> FrontMatter {
        match value {
            Value::Object(map) => map,
            _ => panic!("front matter fixture must be an object"),
        }
    }

    #[test]
    fn replace_drops_old_sub_keys() {
        let base = fm(json!({"config": {"keep": "y"}}));
        let patch = Patch::new("t", MergeMode::Replace, 10).with("config", json!({"added": "x"}));

        let out = merge_front_matter(&base, &[patch]);
        assert_eq!(out["config"], json!({"added": "x"}));
    }

    #[test]
    fn set_if_missing_keeps_existing() {
        let base = fm(json!({"existing": "keep"}));
        let patch = Patch::new("t", MergeMode::SetIfMissing, 10)
            .with("existing", "ignored")
            .with("new", "added");

        let out = merge_front_matter(&base, &[patch]);
        assert_eq!(Value::Object(out), json!({"existing": "keep", "new": "added"}));
    }

    #[test]
    fn set_if_missing_fills_absent_sub_keys_only() {
        let base = fm(json!({"params": {"a": 1, "nested": {"x": 1}}}));
        let patch = Patch::new("t", MergeMode::SetIfMissing, 10)
            .with("params", json!({"a": 2, "b": 3, "nested": {"y": 2}}));

        let out = merge_front_matter(&base, &[patch]);
        assert_eq!(out["params"], json!({"a": 1, "b": 3, "nested": {"x": 1}}));
    }

    #[test]
    fn set_if_missing_ignores_type_mismatch() {
        let base = fm(json!({"params": "flat"}));
        let patch = Patch::new("t", MergeMode::SetIfMissing, 10).with("params", json!({"a": 1}));

        let out = merge_front_matter(&base, &[patch]);
        assert_eq!(out["params"], json!("flat"));
    }

    #[test]
    fn deep_merges_maps_one_level() {
        let base = fm(json!({"params": {"a": 1, "nested": {"x": 1, "y": 1}}}));
        let patch = Patch::new("t", MergeMode::Deep, 10)
            .with("params", json!({"b": 2, "nested": {"z": 3}}));

        let out = merge_front_matter(&base, &[patch]);
        // `nested` is replaced wholesale, not merged
        assert_eq!(out["params"], json!({"a": 1, "b": 2, "nested": {"z": 3}}));
    }

    #[test]
    fn deep_union_dedups_in_first_seen_order() {
        let base = fm(json!({"tags": ["existing", "old"]}));
        let patch = Patch::new("t", MergeMode::Deep, 10)
            .with("tags", json!(["new", "existing"]))
            .with_array_strategy(ArrayStrategy::Union);

        let out = merge_front_matter(&base, &[patch]);
        assert_eq!(out["tags"], json!(["existing", "old", "new"]));
    }

    #[test]
    fn deep_append_keeps_duplicates() {
        let base = fm(json!({"tags": ["a", "b"]}));
        let patch = Patch::new("t", MergeMode::Deep, 10)
            .with("tags", json!(["b", "c"]))
            .with_array_strategy(ArrayStrategy::Append);

        let out = merge_front_matter(&base, &[patch]);
        assert_eq!(out["tags"], json!(["a", "b", "b", "c"]));
    }

    #[test]
    fn deep_treats_empty_list_as_string_list() {
        let base = fm(json!({"tags": []}));
        let patch = Patch::new("t", MergeMode::Deep, 10)
            .with("tags", json!(["a"]))
            .with_array_strategy(ArrayStrategy::Union);
        assert_eq!(merge_front_matter(&base, &[patch])["tags"], json!(["a"]));

        // An empty incoming list merges rather than overriding.
        let base = fm(json!({"tags": ["a"]}));
        let patch = Patch::new("t", MergeMode::Deep, 10)
            .with("tags", json!([]))
            .with_array_strategy(ArrayStrategy::Append);
        assert_eq!(merge_front_matter(&base, &[patch])["tags"], json!(["a"]));
    }

    #[test]
    fn deep_replace_strategy_takes_new_list() {
        let base = fm(json!({"tags": ["a"]}));
        let patch = Patch::new("t", MergeMode::Deep, 10).with("tags", json!(["b"]));

        let out = merge_front_matter(&base, &[patch]);
        assert_eq!(out["tags"], json!(["b"]));
    }

    #[test]
    fn deep_mixed_lists_override() {
        let base = fm(json!({"tags": ["a", 1]}));
        let patch = Patch::new("t", MergeMode::Deep, 10)
            .with("tags", json!(["b"]))
            .with_array_strategy(ArrayStrategy::Union);

        let out = merge_front_matter(&base, &[patch]);
        assert_eq!(out["tags"], json!(["b"]));
    }

    #[test]
    fn deep_type_mismatch_overrides() {
        let base = fm(json!({"weight": {"a": 1}}));
        let patch = Patch::new("t", MergeMode::Deep, 10).with("weight", 5);

        let out = merge_front_matter(&base, &[patch]);
        assert_eq!(out["weight"], json!(5));
    }

    #[test]
    fn higher_priority_wins_regardless_of_order() {
        let high = Patch::new("high", MergeMode::Deep, 50).with("title", "from-50");
        let low = Patch::new("low", MergeMode::Deep, 10).with("title", "from-10");

        let out = merge_front_matter(&FrontMatter::new(), &[high.clone(), low.clone()]);
        assert_eq!(out["title"], json!("from-50"));

        let out = merge_front_matter(&FrontMatter::new(), &[low, high]);
        assert_eq!(out["title"], json!("from-50"));
    }

    #[test]
    fn equal_priority_keeps_contribution_order() {
        let first = Patch::new("first", MergeMode::Deep, 10).with("title", "first");
        let second = Patch::new("second", MergeMode::Deep, 10).with("title", "second");

        let out = merge_front_matter(&FrontMatter::new(), &[first, second]);
        assert_eq!(out["title"], json!("second"));
    }

    #[test]
    fn base_is_not_mutated() {
        let base = fm(json!({"title": "orig"}));
        let patch = Patch::new("t", MergeMode::Replace, 1).with("title", "new");

        let _ = merge_front_matter(&base, &[patch]);
        assert_eq!(base["title"], json!("orig"));
    }

    #[test]
    fn merge_is_deterministic() {
        let patches = vec![
            Patch::new("a", MergeMode::Deep, 20)
                .with("tags", json!(["x", "y"]))
                .with_array_strategy(ArrayStrategy::Union),
            Patch::new("b", MergeMode::SetIfMissing, 5).with("title", "T"),
            Patch::new("c", MergeMode::Deep, 20)
                .with("tags", json!(["y", "z"]))
                .with_array_strategy(ArrayStrategy::Union),
        ];
        let base = fm(json!({"tags": ["w"]}));

        let first = serde_json::to_string(&merge_front_matter(&base, &patches)).unwrap();
        for _ in 0..10 {
            let again = serde_json::to_string(&merge_front_matter(&base, &patches)).unwrap();
            assert_eq!(first, again);
        }
        assert!(first.contains(r#""tags":["w","x","y","z"]"#));
    }

    #[test]
    fn array_strategy_parses_config_names() {
        assert_eq!("union".parse::<ArrayStrategy>().unwrap(), ArrayStrategy::Union);
        assert_eq!("append".parse::<ArrayStrategy>().unwrap(), ArrayStrategy::Append);
        assert!("merge".parse::<ArrayStrategy>().is_err());
    }
}
