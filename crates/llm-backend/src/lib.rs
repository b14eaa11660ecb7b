//! `llm-backend`: synchronous drivers for local text-generation models.
//!
//! Every backend implements the same narrow contract: given a prompt and a
//! set of [`GenerationParams`], return the generated text or a recoverable
//! [`BackendError`]. Callers hold a `Box<dyn GenerationBackend>` and never see
//! backend-specific configuration.
//!
//! # Architecture
//!
//! ```text
//! BackendConfig (YAML, tagged by `type`)
//!     │  build()
//!     ▼
//! Box<dyn GenerationBackend>
//!     ├── HttpBackend     ← llama.cpp `/completion` or OpenAI-style `/v1/completions`
//!     ├── CommandBackend  ← local executable, prompt on stdin, completion on stdout
//!     └── StaticBackend   ← fixed completion (dry runs, tests)
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use llm_backend::{BackendConfig, GenerationParams};
//!
//! let backend = BackendConfig::default().build()?;
//! let text = backend.generate("Say hello as JSON: {", &GenerationParams::default())?;
//! ```
//!
//! There are no built-in retries. Wrap a backend in another
//! `GenerationBackend` to add them.

pub mod config;
pub mod error;
pub mod fixed;
pub mod http;
pub mod process;
pub mod types;

pub use config::{BackendConfig, HttpApi};
pub use error::BackendError;
pub use fixed::StaticBackend;
pub use http::HttpBackend;
pub use process::CommandBackend;
pub use types::GenerationParams;

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, BackendError>;

/// A text-generation capability.
///
/// Implementations block until the completion is available or the configured
/// timeout expires. A failure is always returned as an error value, never as
/// a panic, so the caller can degrade the current unit of work and move on.
pub trait GenerationBackend: Send + Sync {
    /// Short identifier used in log lines (e.g. `"http:llama_cpp"`).
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

impl<B: GenerationBackend + ?Sized> GenerationBackend for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        (**self).generate(prompt, params)
    }
}

/// Cut `text` at the first occurrence of any stop sequence.
///
/// Servers apply stop sequences themselves; subprocess backends use this to
/// get the same behaviour. The stop sequence itself is not included.
pub fn truncate_at_stop<'a>(text: &'a str, stop: &[String]) -> &'a str {
    let cut = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min();
    match cut {
        Some(idx) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_at_earliest_stop() {
        let stop = vec!["}".to_string(), "\n\n".to_string()];
        assert_eq!(truncate_at_stop("\"a\": 1}\n\nmore", &stop), "\"a\": 1");
        assert_eq!(truncate_at_stop("\"a\": 1\n\n}", &stop), "\"a\": 1");
    }

    #[test]
    fn truncate_without_match_keeps_text() {
        assert_eq!(truncate_at_stop("plain", &["}".to_string()]), "plain");
        assert_eq!(truncate_at_stop("a}b", &[String::new()]), "a}b");
    }

    #[test]
    fn boxed_backend_delegates() {
        let backend: Box<dyn GenerationBackend> = Box::new(StaticBackend::new("ok"));
        assert_eq!(backend.name(), "static");
        assert_eq!(
            backend.generate("p", &GenerationParams::default()).unwrap(),
            "ok"
        );
    }
}
