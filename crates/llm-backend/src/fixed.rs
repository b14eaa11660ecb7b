use crate::{GenerationBackend, GenerationParams, Result};

/// A backend that answers every prompt with the same completion.
///
/// Used by `flowport convert --dry-run` to exercise the whole pipeline
/// without a model, and by tests.
#[derive(Debug, Clone)]
pub struct StaticBackend {
    completion: String,
}

impl StaticBackend {
    pub fn new(completion: impl Into<String>) -> Self {
        Self {
            completion: completion.into(),
        }
    }
}

impl GenerationBackend for StaticBackend {
    fn name(&self) -> &str {
        "static"
    }

    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        tracing::debug!(
            prompt_len = prompt.len(),
            max_tokens = params.max_tokens,
            "static backend answering"
        );
        Ok(self.completion.clone())
    }
}
