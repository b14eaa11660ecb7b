use llm_backend::{GenerationBackend, GenerationParams};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{TrailingText, TranslationConfig};
use crate::extract::ActionRecord;
use crate::recovery::{self, OPEN};

/// Marks where the action JSON is spliced into a prompt template.
pub const ACTION_PLACEHOLDER: &str = "{action}";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
Analyze this Nintex workflow action and produce the equivalent Power Automate action.
Respond only with the JSON of the equivalent Power Automate action.

Nintex action:
{action}

JSON response:
";

// ---------------------------------------------------------------------------
// TranslatedAction
// ---------------------------------------------------------------------------

/// Outcome of translating one action.
///
/// Serialized untagged: a success is the target-format object itself, a
/// failure is `{"error": ..., "original_action": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TranslatedAction {
    Translated(Map<String, Value>),
    Failed {
        error: String,
        original_action: ActionRecord,
    },
}

impl TranslatedAction {
    pub fn is_failed(&self) -> bool {
        matches!(self, TranslatedAction::Failed { .. })
    }

    fn failed(error: String, record: &ActionRecord) -> Self {
        TranslatedAction::Failed {
            error,
            original_action: record.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// TranslationEngine
// ---------------------------------------------------------------------------

/// Turns [`ActionRecord`]s into target-format actions through a model.
pub struct TranslationEngine {
    backend: Box<dyn GenerationBackend>,
    params: GenerationParams,
    template: String,
    trailing: TrailingText,
}

impl TranslationEngine {
    pub fn new(backend: Box<dyn GenerationBackend>, config: &TranslationConfig) -> Self {
        Self {
            backend,
            params: config.generation_params(),
            template: config
                .prompt_template
                .clone()
                .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string()),
            trailing: config.trailing_text,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Instructions, the record as JSON context, then an opening `{`.
    pub fn prompt_for(&self, record: &ActionRecord) -> String {
        let context =
            serde_json::to_string_pretty(record).unwrap_or_else(|_| format!("{record:?}"));
        let mut prompt = self.template.replace(ACTION_PLACEHOLDER, &context);
        prompt.push(OPEN);
        prompt
    }

    /// Translate one action. Failures come back as [`TranslatedAction::Failed`].
    pub fn translate(&self, record: &ActionRecord) -> TranslatedAction {
        let prompt = self.prompt_for(record);
        tracing::debug!(action = %record.id(), prompt = %prompt, "generating translation");

        let raw = match self.backend.generate(&prompt, &self.params) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    action = %record.id(),
                    backend = self.backend.name(),
                    timeout = e.is_timeout(),
                    error = %e,
                    "generation failed"
                );
                return TranslatedAction::failed(
                    format!("backend '{}' failed: {e}", self.backend.name()),
                    record,
                );
            }
        };
        tracing::debug!(action = %record.id(), len = raw.len(), raw = %raw, "response generated");

        match recovery::recover(&raw, self.trailing) {
            Ok(map) => TranslatedAction::Translated(map),
            Err(e) => {
                tracing::warn!(action = %record.id(), error = %e, "translation failed");
                TranslatedAction::failed(
                    format!("could not produce a valid translation: {e}"),
                    record,
                )
            }
        }
    }
}
