use thiserror::Error;

/// Upper bound on the input excerpt carried by [`FlowportError::MalformedDocument`].
pub const SNIPPET_LIMIT: usize = 500;

#[derive(Debug, Error)]
pub enum FlowportError {
    #[error("workflow document not found or empty: {0}")]
    DocumentNotFound(String),

    #[error("malformed workflow document: {reason}\n  near: {snippet}")]
    MalformedDocument { reason: String, snippet: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FlowportError {
    /// Build a `MalformedDocument` error carrying a bounded excerpt of `raw`.
    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        FlowportError::MalformedDocument {
            reason: reason.into(),
            snippet: snippet(raw),
        }
    }
}

/// First [`SNIPPET_LIMIT`] characters of `raw`, with `...` when truncated.
pub fn snippet(raw: &str) -> String {
    let mut chars = raw.chars();
    let head: String = chars.by_ref().take(SNIPPET_LIMIT).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

pub type Result<T> = std::result::Result<T, FlowportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_is_bounded() {
        let raw = "x".repeat(SNIPPET_LIMIT + 20);
        let s = snippet(&raw);
        assert_eq!(s.len(), SNIPPET_LIMIT + 3);
        assert!(s.ends_with("..."));
    }

    #[test]
    fn short_input_is_kept_whole() {
        assert_eq!(snippet("<a>"), "<a>");
        let err = FlowportError::malformed("unclosed", "<a>");
        assert!(err.to_string().contains("near: <a>"));
    }
}
