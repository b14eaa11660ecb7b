use serde::Serialize;
use std::path::Path;

use crate::config::SchemaConfig;
use crate::document::{load_source, parse, Document, ParentIndex};
use crate::error::Result;
use crate::extract::{extract, ActionRecord};
use crate::hierarchy::resolve_parent_id;
use crate::translate::TranslationEngine;
use crate::tree::{build, BuildStats, WorkflowResult};

/// Load, parse and translate the workflow at `path`, returning the result
/// together with the run's counters.
///
/// Document-level problems ([`FlowportError::DocumentNotFound`],
/// [`FlowportError::MalformedDocument`]) are returned before any action is
/// translated.
///
/// [`FlowportError::DocumentNotFound`]: crate::FlowportError::DocumentNotFound
/// [`FlowportError::MalformedDocument`]: crate::FlowportError::MalformedDocument
pub fn process_workflow(
    path: &Path,
    schema: &SchemaConfig,
    engine: &TranslationEngine,
) -> Result<(WorkflowResult, BuildStats)> {
    let (document, parents) = open(path, schema)?;
    tracing::info!(backend = engine.backend_name(), "translating actions");
    Ok(build(&document, &parents, schema, engine))
}

/// One row of [`inspect_workflow`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOverview {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: String,
    pub parent: String,
    pub properties: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Parse the workflow at `path` and describe every action without
/// translating anything.
pub fn inspect_workflow(path: &Path, schema: &SchemaConfig) -> Result<Vec<ActionOverview>> {
    let (document, parents) = open(path, schema)?;
    let rows = document
        .elements_tagged(&schema.action_tag)
        .map(|node| {
            let parent = resolve_parent_id(&node, &parents, &schema.action_tag);
            match extract(&node, schema) {
                ActionRecord::Extracted {
                    id,
                    name,
                    declared_type,
                    properties,
                } => ActionOverview {
                    id,
                    name,
                    declared_type,
                    parent,
                    properties: properties.len(),
                    error: None,
                },
                ActionRecord::Degraded { id, error } => ActionOverview {
                    name: node.attr_lossy("name"),
                    declared_type: node.attr_lossy("type"),
                    id,
                    parent,
                    properties: 0,
                    error: Some(error),
                },
            }
        })
        .collect();
    Ok(rows)
}

fn open(path: &Path, schema: &SchemaConfig) -> Result<(Document, ParentIndex)> {
    let raw = load_source(path)?;
    let (document, parents) = parse(&raw)?;

    let summary = document.summarize(&schema.action_tag);
    tracing::info!(
        root = %summary.root_tag,
        elements = summary.element_count,
        actions = summary.actions.len(),
        "workflow parsed"
    );
    for action in &summary.actions {
        tracing::info!(id = %action.id, name = %action.name, "found action");
    }
    Ok((document, parents))
}
