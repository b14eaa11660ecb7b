use std::time::Duration;

// ─── GenerationParams ─────────────────────────────────────────────────────

/// Per-call generation settings passed to every backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature. Values near zero favour deterministic output.
    pub temperature: f32,
    /// Generation stops before the first of these sequences.
    pub stop: Vec<String>,
    /// Wall-clock limit for one call. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

pub const DEFAULT_MAX_TOKENS: u32 = 512;
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            stop: vec!["}".to_string()],
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl GenerationParams {
    /// Render `template`, replacing `{max_tokens}` and `{temperature}`.
    ///
    /// Used to build argument lists for subprocess backends.
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{max_tokens}", &self.max_tokens.to_string())
            .replace("{temperature}", &self.temperature.to_string())
    }
}
