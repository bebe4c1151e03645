//! Behavior tree.
//!
//! Every nesting level of a route declaration is a [`Behavior`]: its own
//! conditions, output params and placeholders plus a handle to its parent.
//! Nodes live in a [`BehaviorTree`] arena owned by the route set being built;
//! parents are plain indices, and the whole arena is dropped once the new
//! routing table is swapped in.

use std::collections::BTreeMap;

use super::condition::{
    compile_conditions, concat_without_endcaps, count_captures, ConditionKey, Conditions,
    NormalizedCondition,
};
use super::params::PlaceholderMap;

/// Handle to a node of a [`BehaviorTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BehaviorId(usize);

#[derive(Debug, Clone)]
pub(crate) struct Behavior {
    parent: Option<BehaviorId>,
    conditions: BTreeMap<ConditionKey, NormalizedCondition>,
    /// Own placeholders with indices local to this node's fragments
    placeholders: BTreeMap<String, (ConditionKey, usize)>,
    params: BTreeMap<String, String>,
    has_regexp: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct BehaviorTree {
    nodes: Vec<Behavior>,
}

impl BehaviorTree {
    /// A tree holding only the root scope, which carries `root_params`.
    pub(crate) fn new(root_params: &BTreeMap<String, String>) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.add(None, &Conditions::new(), root_params.clone());
        tree
    }

    pub(crate) fn root(&self) -> BehaviorId {
        BehaviorId(0)
    }

    /// Add a node. Every named placeholder becomes an output param of the same
    /// name; explicit `params` override those.
    pub(crate) fn add(
        &mut self,
        parent: Option<BehaviorId>,
        conditions: &Conditions,
        params: BTreeMap<String, String>,
    ) -> BehaviorId {
        let compiled = compile_conditions(conditions);
        let mut own_params = BTreeMap::new();
        let mut placeholders = BTreeMap::new();
        for (name, key, index) in compiled.placeholders {
            own_params.insert(name.clone(), format!(":{name}"));
            placeholders.insert(name, (key, index));
        }
        own_params.extend(params);

        self.nodes.push(Behavior {
            parent,
            conditions: compiled.conditions,
            placeholders,
            params: own_params,
            has_regexp: compiled.has_regexp,
        });
        BehaviorId(self.nodes.len() - 1)
    }

    fn node(&self, id: BehaviorId) -> &Behavior {
        &self.nodes[id.0]
    }

    /// Root-to-node chain, the node itself last.
    pub(crate) fn lineage(&self, id: BehaviorId) -> Vec<BehaviorId> {
        let mut chain = vec![id];
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            chain.push(parent);
            current = self.node(parent).parent;
        }
        chain.reverse();
        chain
    }

    fn merge_by<F>(&self, id: BehaviorId, pick: F) -> BTreeMap<ConditionKey, String>
    where
        F: Fn(&NormalizedCondition) -> &str,
    {
        let mut merged: BTreeMap<ConditionKey, String> = BTreeMap::new();
        for node_id in self.lineage(id) {
            for (key, condition) in &self.node(node_id).conditions {
                let value = pick(condition);
                if *key == ConditionKey::Path {
                    if let Some(path) =
                        concat_without_endcaps(merged.get(key).map(String::as_str), Some(value))
                    {
                        merged.insert(ConditionKey::Path, path);
                    }
                } else {
                    merged.insert(key.clone(), value.to_string());
                }
            }
        }
        merged
    }

    /// Regex sources for every key, with path fragments concatenated across
    /// scopes and other keys taken from the most specific scope declaring them.
    pub(crate) fn merged_conditions(&self, id: BehaviorId) -> BTreeMap<ConditionKey, String> {
        self.merge_by(id, |c| &c.source)
    }

    /// Same as [`merged_conditions`](Self::merged_conditions) before
    /// placeholder substitution, for display.
    pub(crate) fn merged_original_conditions(
        &self,
        id: BehaviorId,
    ) -> BTreeMap<ConditionKey, String> {
        self.merge_by(id, |c| &c.original)
    }

    /// The full path as plain template text (`/items/:id`).
    ///
    /// `Err` carries the reason when any scope declared its path as a regex.
    pub(crate) fn merged_path_template(&self, id: BehaviorId) -> Result<String, String> {
        let mut template = String::new();
        for node_id in self.lineage(id) {
            if let Some(path) = self.node(node_id).conditions.get(&ConditionKey::Path) {
                match &path.template {
                    Some(text) if !path.is_regex => template.push_str(text),
                    _ => {
                        return Err(format!(
                            "path fragment /{}/ is a regular expression",
                            path.original
                        ))
                    }
                }
            }
        }
        Ok(template)
    }

    pub(crate) fn merged_params(&self, id: BehaviorId) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        for node_id in self.lineage(id) {
            merged.extend(
                self.node(node_id)
                    .params
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
        }
        merged
    }

    /// Placeholders of the node and all its ancestors, with path capture
    /// indices shifted by the groups every strict ancestor's own path
    /// fragment contributes ahead of them. Later (deeper) names win.
    pub(crate) fn merged_placeholders(&self, id: BehaviorId) -> PlaceholderMap {
        let mut merged = PlaceholderMap::new();
        let mut preceding_captures = 0;
        for node_id in self.lineage(id) {
            let node = self.node(node_id);
            for (name, (key, index)) in &node.placeholders {
                let index = if *key == ConditionKey::Path {
                    index + preceding_captures
                } else {
                    *index
                };
                merged.insert(name.clone(), (key.clone(), index));
            }
            preceding_captures += self.path_captures(node_id);
        }
        merged
    }

    /// Capture groups in this node's own path fragment.
    pub(crate) fn path_captures(&self, id: BehaviorId) -> usize {
        self.node(id)
            .conditions
            .get(&ConditionKey::Path)
            .map_or(0, |c| count_captures(&c.source))
    }

    /// Whether any scope up the chain declared a hand-written regex.
    pub(crate) fn has_regexp(&self, id: BehaviorId) -> bool {
        self.lineage(id)
            .into_iter()
            .any(|node_id| self.node(node_id).has_regexp)
    }
}
