use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{BackendError, CommandBackend, GenerationBackend, HttpBackend, Result, StaticBackend};

// ---------------------------------------------------------------------------
// HttpApi
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpApi {
    #[default]
    LlamaCpp,
    #[serde(rename = "openai")]
    OpenAi,
}

impl HttpApi {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpApi::LlamaCpp => "llama_cpp",
            HttpApi::OpenAi => "openai",
        }
    }
}

// ---------------------------------------------------------------------------
// BackendConfig
// ---------------------------------------------------------------------------

/// Which generation backend to use and how to reach it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Http {
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default)]
        api: HttpApi,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        /// Name of the environment variable holding a bearer token.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        api_key_env: Option<String>,
    },
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        env: HashMap<String, String>,
    },
    Static {
        #[serde(default = "default_static_completion")]
        completion: String,
    },
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_static_completion() -> String {
    "{\"type\": \"Compose\", \"inputs\": \"dry run\"}".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Http {
            base_url: default_base_url(),
            api: HttpApi::default(),
            model: None,
            api_key_env: None,
        }
    }
}

impl BackendConfig {
    /// A static backend with the default canned completion.
    pub fn dry_run() -> Self {
        BackendConfig::Static {
            completion: default_static_completion(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Http { .. } => "http",
            BackendConfig::Command { .. } => "command",
            BackendConfig::Static { .. } => "static",
        }
    }

    /// Construct the configured backend.
    pub fn build(&self) -> Result<Box<dyn GenerationBackend>> {
        match self {
            BackendConfig::Http {
                base_url,
                api,
                model,
                api_key_env,
            } => {
                let api_key = match api_key_env {
                    Some(var) => Some(std::env::var(var).map_err(|_| {
                        BackendError::Config(format!("environment variable '{var}' is not set"))
                    })?),
                    None => None,
                };
                let backend = HttpBackend::new(base_url.clone(), *api)?
                    .with_model(model.clone())
                    .with_api_key(api_key);
                Ok(Box::new(backend))
            }
            BackendConfig::Command { program, args, env } => {
                let mut env: Vec<(String, String)> =
                    env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                env.sort();
                let backend = CommandBackend::new(program, args.clone())?.with_env(env);
                Ok(Box::new(backend))
            }
            BackendConfig::Static { completion } => {
                Ok(Box::new(StaticBackend::new(completion.clone())))
            }
        }
    }

    /// Problems that would make [`BackendConfig::build`] fail, without building.
    pub fn problems(&self) -> Vec<String> {
        let mut out = Vec::new();
        match self {
            BackendConfig::Http {
                base_url,
                api_key_env,
                ..
            } => {
                if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
                    out.push(format!("backend.base_url '{base_url}' is not an http(s) URL"));
                }
                if let Some(var) = api_key_env {
                    if std::env::var_os(var).is_none() {
                        out.push(format!("backend.api_key_env '{var}' is not set"));
                    }
                }
            }
            BackendConfig::Command { program, .. } => {
                if program.trim().is_empty() {
                    out.push("backend.program is empty".to_string());
                } else if which::which(program).is_err() {
                    out.push(format!("backend.program '{program}' not found"));
                }
            }
            BackendConfig::Static { .. } => {}
        }
        out
    }
}
