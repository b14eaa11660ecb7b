use indexmap::IndexMap;
use serde::Serialize;

use crate::config::SchemaConfig;
use crate::document::{Document, ParentIndex};
use crate::extract::extract;
use crate::hierarchy::resolve_parent_id;
use crate::translate::{TranslatedAction, TranslationEngine};

// ---------------------------------------------------------------------------
// WorkflowResult
// ---------------------------------------------------------------------------

/// One translated action listed under its parent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeEntry {
    pub id: String,
    pub action: TranslatedAction,
}

/// The assembled output of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowResult {
    /// Parent id (or `"root"`) → children in document order.
    #[serde(rename = "workflow_tree")]
    pub action_tree: IndexMap<String, Vec<TreeEntry>>,
    /// Action id → translation.
    pub processed_actions: IndexMap<String, TranslatedAction>,
}

impl WorkflowResult {
    pub fn children_of(&self, parent_id: &str) -> &[TreeEntry] {
        self.action_tree
            .get(parent_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.action_tree.is_empty() && self.processed_actions.is_empty()
    }

    fn record(&mut self, id: String, parent_id: String, action: TranslatedAction) -> bool {
        let replaced = self
            .processed_actions
            .insert(id.clone(), action.clone())
            .is_some();
        self.action_tree
            .entry(parent_id)
            .or_default()
            .push(TreeEntry { id, action });
        replaced
    }
}

/// Counters for one [`build`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub actions: usize,
    pub recorded: usize,
    pub skipped_without_id: usize,
    pub degraded: usize,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

/// Translate every action in `document` and assemble the result.
///
/// Actions are visited depth-first in document order. Each one is resolved,
/// extracted and translated in turn; failures stay inside the action's
/// [`TranslatedAction`]. Actions without an id are translated but not
/// recorded.
pub fn build(
    document: &Document,
    parents: &ParentIndex,
    schema: &SchemaConfig,
    engine: &TranslationEngine,
) -> (WorkflowResult, BuildStats) {
    let mut result = WorkflowResult::default();
    let mut stats = BuildStats::default();

    for node in document.elements_tagged(&schema.action_tag) {
        stats.actions += 1;
        let action_id = node.attr_lossy("id");
        tracing::info!(action = %action_id, position = stats.actions, "processing action");

        let parent_id = resolve_parent_id(&node, parents, &schema.action_tag);
        tracing::debug!(action = %action_id, parent = %parent_id, "parent resolved");

        let record = extract(&node, schema);
        if record.is_degraded() {
            stats.degraded += 1;
        }
        let translated = engine.translate(&record);
        if translated.is_failed() {
            stats.failed += 1;
        }

        if action_id.is_empty() {
            stats.skipped_without_id += 1;
            tracing::warn!(
                name = %record.name(),
                "action has no id; translated but not recorded"
            );
            continue;
        }

        if result.record(action_id.clone(), parent_id.clone(), translated) {
            tracing::warn!(action = %action_id, "duplicate action id; keeping the later translation");
        }
        stats.recorded += 1;
        tracing::info!(action = %action_id, parent = %parent_id, "action recorded");
    }

    tracing::info!(
        actions = stats.actions,
        recorded = stats.recorded,
        skipped = stats.skipped_without_id,
        degraded = stats.degraded,
        failed = stats.failed,
        parents = result.action_tree.len(),
        "action tree built"
    );
    (result, stats)
}
