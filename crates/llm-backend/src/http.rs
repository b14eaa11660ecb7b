use serde_json::{json, Value};

use crate::config::HttpApi;
use crate::{BackendError, GenerationBackend, GenerationParams, Result};

// ─── HttpBackend ──────────────────────────────────────────────────────────

/// A model served over HTTP by a local inference server.
///
/// Two wire dialects are supported:
///
/// - [`HttpApi::LlamaCpp`]: `POST {base}/completion`, request
///   `{prompt, n_predict, temperature, stop}`, response `{content}`.
/// - [`HttpApi::OpenAi`]: `POST {base}/v1/completions`, request
///   `{model, prompt, max_tokens, temperature, stop}`, response
///   `{choices: [{text}]}`.
pub struct HttpBackend {
    client: reqwest::blocking::Client,
    base_url: String,
    api: HttpApi,
    model: Option<String>,
    api_key: Option<String>,
    name: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, api: HttpApi) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(BackendError::Config("http backend needs a base_url".into()));
        }
        Ok(Self {
            client,
            base_url,
            api,
            model: None,
            api_key: None,
            name: format!("http:{}", api.as_str()),
        })
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn endpoint(&self) -> String {
        match self.api {
            HttpApi::LlamaCpp => format!("{}/completion", self.base_url),
            HttpApi::OpenAi => format!("{}/v1/completions", self.base_url),
        }
    }

    fn request_body(&self, prompt: &str, params: &GenerationParams) -> Value {
        match self.api {
            HttpApi::LlamaCpp => json!({
                "prompt": prompt,
                "n_predict": params.max_tokens,
                "temperature": params.temperature,
                "stop": params.stop,
            }),
            HttpApi::OpenAi => {
                let mut body = json!({
                    "prompt": prompt,
                    "max_tokens": params.max_tokens,
                    "temperature": params.temperature,
                    "stop": params.stop,
                });
                if let Some(model) = &self.model {
                    body["model"] = Value::String(model.clone());
                }
                body
            }
        }
    }
}

impl GenerationBackend for HttpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let url = self.endpoint();
        let mut req = self.client.post(&url).json(&self.request_body(prompt, params));
        if let Some(timeout) = params.timeout {
            req = req.timeout(timeout);
        }
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        tracing::debug!(url = %url, prompt_len = prompt.len(), "sending completion request");
        let response = req.send().map_err(|e| timeout_or(e, params))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let value: Value = response.json().map_err(|e| timeout_or(e, params))?;
        extract_completion(self.api, &value)
    }
}

fn timeout_or(err: reqwest::Error, params: &GenerationParams) -> BackendError {
    match params.timeout {
        Some(limit) if err.is_timeout() => BackendError::Timeout(limit),
        _ => BackendError::Http(err),
    }
}

/// Pull the generated text out of a server response.
fn extract_completion(api: HttpApi, value: &Value) -> Result<String> {
    let text = match api {
        HttpApi::LlamaCpp => value.get("content").and_then(Value::as_str),
        HttpApi::OpenAi => value
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("text"))
            .and_then(Value::as_str),
    };
    text.map(str::to_string).ok_or_else(|| {
        let shown: String = value.to_string().chars().take(200).collect();
        BackendError::Response(format!("no completion text in {shown}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn params() -> GenerationParams {
        GenerationParams {
            max_tokens: 32,
            temperature: 0.0,
            stop: vec!["}".into()],
            timeout: Some(std::time::Duration::from_secs(5)),
        }
    }

    #[test]
    fn llama_cpp_round_trip() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/completion")
            .match_body(Matcher::PartialJson(json!({
                "prompt": "hi {",
                "n_predict": 32,
                "stop": ["}"],
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"content": "\"kind\": \"Compose\""}"#)
            .create();

        let backend = HttpBackend::new(server.url(), HttpApi::LlamaCpp).unwrap();
        let text = backend.generate("hi {", &params()).unwrap();
        assert_eq!(text, "\"kind\": \"Compose\"");
        assert_eq!(backend.name(), "http:llama_cpp");
        mock.assert();
    }

    #[test]
    fn openai_round_trip_sends_model_and_key() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/completions")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(json!({
                "model": "mistral-7b",
                "max_tokens": 32,
            })))
            .with_status(200)
            .with_body(r#"{"choices": [{"text": "\"ok\": true"}]}"#)
            .create();

        let backend = HttpBackend::new(format!("{}/", server.url()), HttpApi::OpenAi)
            .unwrap()
            .with_model(Some("mistral-7b".into()))
            .with_api_key(Some("secret".into()));
        let text = backend.generate("prompt", &params()).unwrap();
        assert_eq!(text, "\"ok\": true");
        mock.assert();
    }

    #[test]
    fn non_success_status_is_reported() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/completion")
            .with_status(503)
            .with_body("model loading")
            .create();

        let backend = HttpBackend::new(server.url(), HttpApi::LlamaCpp).unwrap();
        let err = backend.generate("p", &params()).unwrap_err();
        match err {
            BackendError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "model loading");
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[test]
    fn missing_completion_field_is_a_response_error() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/completion")
            .with_status(200)
            .with_body(r#"{"unexpected": 1}"#)
            .create();

        let backend = HttpBackend::new(server.url(), HttpApi::LlamaCpp).unwrap();
        let err = backend.generate("p", &params()).unwrap_err();
        assert!(matches!(err, BackendError::Response(_)));
        assert!(!err.is_timeout());
    }

    #[test]
    fn empty_base_url_is_rejected() {
        assert!(matches!(
            HttpBackend::new("", HttpApi::LlamaCpp),
            Err(BackendError::Config(_))
        ));
    }
}
