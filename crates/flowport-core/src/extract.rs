use indexmap::IndexMap;
use serde::Serialize;

use crate::config::{PropertyScope, SchemaConfig};
use crate::document::Node;

/// Data pulled out of one action element.
///
/// Serializes to the JSON shape embedded in prompts and error records:
/// `{id, name, type, properties}` or, when extraction degraded, `{id, error}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActionRecord {
    Extracted {
        id: String,
        name: String,
        #[serde(rename = "type")]
        declared_type: String,
        properties: IndexMap<String, String>,
    },
    Degraded {
        id: String,
        error: String,
    },
}

impl ActionRecord {
    pub fn id(&self) -> &str {
        match self {
            ActionRecord::Extracted { id, .. } | ActionRecord::Degraded { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ActionRecord::Extracted { name, .. } => name,
            ActionRecord::Degraded { .. } => "",
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ActionRecord::Degraded { .. })
    }
}

/// Extract identity, declared type and properties of `node`.
///
/// Properties come from descendant elements tagged `schema.property_tag`
/// with a non-empty `name` attribute. When a name repeats, the last value
/// wins and the key keeps the position of its first occurrence.
///
/// Never fails: an unreadable attribute or property yields
/// [`ActionRecord::Degraded`].
pub fn extract(node: &Node<'_>, schema: &SchemaConfig) -> ActionRecord {
    match try_extract(node, schema) {
        Ok(record) => record,
        Err(error) => {
            let id = node.attr_lossy("id");
            tracing::warn!(action = %id, %error, "action extraction degraded");
            ActionRecord::Degraded { id, error }
        }
    }
}

fn try_extract(node: &Node<'_>, schema: &SchemaConfig) -> Result<ActionRecord, String> {
    let attr = |name: &str| -> Result<String, String> {
        node.attr(name)
            .map(|v| v.map(|v| v.into_owned()).unwrap_or_default())
            .map_err(|e| format!("attribute '{name}': {e}"))
    };
    let id = attr("id")?;
    let name = attr("name")?;
    let declared_type = attr("type")?;

    let candidates = match schema.property_scope {
        PropertyScope::Descendants => node.descendants(),
        PropertyScope::Own => node.descendants_pruned(|n| n.is(&schema.action_tag)),
    };

    let mut properties = IndexMap::new();
    for prop in candidates.iter().filter(|n| n.is(&schema.property_tag)) {
        let key = match prop.attr("name") {
            Ok(Some(k)) if !k.is_empty() => k.into_owned(),
            Ok(_) => continue,
            Err(e) => return Err(format!("property name: {e}")),
        };
        let value = prop
            .text()
            .map_err(|e| format!("property '{key}': {e}"))?;
        tracing::debug!(action = %id, property = %key, value = %value, "property found");
        properties.insert(key, value);
    }

    Ok(ActionRecord::Extracted {
        id,
        name,
        declared_type,
        properties,
    })
}
