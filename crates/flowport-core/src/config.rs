use crate::error::{FlowportError, Result};
use llm_backend::{BackendConfig, GenerationParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "flowport.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// SchemaConfig
// ---------------------------------------------------------------------------

/// Which properties count toward an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyScope {
    /// Every property element below the action, nested actions included.
    #[default]
    Descendants,
    /// Stop at nested action elements.
    Own,
}

/// Element and attribute vocabulary of the source format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "default_action_tag")]
    pub action_tag: String,
    #[serde(default = "default_property_tag")]
    pub property_tag: String,
    #[serde(default)]
    pub property_scope: PropertyScope,
}

fn default_action_tag() -> String {
    "NWActionConfig".to_string()
}

fn default_property_tag() -> String {
    "property".to_string()
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            action_tag: default_action_tag(),
            property_tag: default_property_tag(),
            property_scope: PropertyScope::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// TranslationConfig
// ---------------------------------------------------------------------------

/// What to do with text following the first complete JSON value in a
/// model response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingText {
    #[default]
    Discard,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_stop")]
    pub stop: Vec<String>,
    /// Per-call limit; `0` disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub trailing_text: TrailingText,
    /// Replaces the built-in instructions. `{action}` marks where the action
    /// JSON goes; the opening `{` is appended automatically.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
}

fn default_max_tokens() -> u32 {
    llm_backend::types::DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    llm_backend::types::DEFAULT_TEMPERATURE
}

fn default_stop() -> Vec<String> {
    vec!["}".to_string()]
}

fn default_timeout_secs() -> u64 {
    llm_backend::types::DEFAULT_TIMEOUT.as_secs()
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            stop: default_stop(),
            timeout_secs: default_timeout_secs(),
            trailing_text: TrailingText::default(),
            prompt_template: None,
        }
    }
}

impl TranslationConfig {
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stop: self.stop.clone(),
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_input")]
    pub input: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

fn default_version() -> u32 {
    1
}

fn default_input() -> PathBuf {
    PathBuf::from("workflow.xml")
}

fn default_output() -> PathBuf {
    PathBuf::from("workflow.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            input: default_input(),
            output: default_output(),
            schema: SchemaConfig::default(),
            translation: TranslationConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path`. Relative `input`/`output` paths are resolved against
    /// the directory containing the config file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(FlowportError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let data = std::fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&data)?;
        if let Some(dir) = path.parent() {
            cfg.input = resolve(dir, &cfg.input);
            cfg.output = resolve(dir, &cfg.output);
        }
        Ok(cfg)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let error = |message: String| ConfigWarning {
            level: WarnLevel::Error,
            message,
        };
        let warning = |message: String| ConfigWarning {
            level: WarnLevel::Warning,
            message,
        };

        if self.version != 1 {
            warnings.push(warning(format!(
                "unknown config version {} (expected 1)",
                self.version
            )));
        }

        if self.schema.action_tag.trim().is_empty() {
            warnings.push(error("schema.action_tag is empty".into()));
        }
        if self.schema.property_tag.trim().is_empty() {
            warnings.push(error("schema.property_tag is empty".into()));
        }
        if self.schema.action_tag == self.schema.property_tag {
            warnings.push(error(format!(
                "schema.action_tag and schema.property_tag are both '{}'",
                self.schema.action_tag
            )));
        }

        let t = &self.translation;
        if t.max_tokens == 0 {
            warnings.push(error("translation.max_tokens must be greater than 0".into()));
        }
        if !(0.0..=2.0).contains(&t.temperature) {
            warnings.push(error(format!(
                "translation.temperature={} is outside 0.0..=2.0",
                t.temperature
            )));
        } else if t.temperature > 0.5 {
            warnings.push(warning(format!(
                "translation.temperature={} is high; output will be less deterministic",
                t.temperature
            )));
        }
        if !t.stop.iter().any(|s| s == "}") {
            warnings.push(warning(
                "translation.stop does not contain '}'; responses may run past the object"
                    .into(),
            ));
        }
        if t.timeout_secs == 0 {
            warnings.push(warning(
                "translation.timeout_secs is 0; a stalled backend blocks the run".into(),
            ));
        }
        if let Some(template) = &t.prompt_template {
            if !template.contains(crate::translate::ACTION_PLACEHOLDER) {
                warnings.push(error(format!(
                    "translation.prompt_template has no {} placeholder",
                    crate::translate::ACTION_PLACEHOLDER
                )));
            }
        }

        for problem in self.backend.problems() {
            warnings.push(error(problem));
        }

        warnings
    }
}

fn resolve(base: &Path, p: &Path) -> PathBuf {
    if p.is_absolute() || base.as_os_str().is_empty() {
        p.to_path_buf()
    } else {
        base.join(p)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.schema, SchemaConfig::default());
        assert_eq!(parsed.translation, TranslationConfig::default());
        assert_eq!(parsed.backend, BackendConfig::default());
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let cfg: Config = serde_yaml::from_str("input: in.xml\n").unwrap();
        assert_eq!(cfg.input, PathBuf::from("in.xml"));
        assert_eq!(cfg.output, PathBuf::from("workflow.json"));
        assert_eq!(cfg.schema.action_tag, "NWActionConfig");
        assert_eq!(cfg.translation.max_tokens, 512);
        assert_eq!(cfg.translation.trailing_text, TrailingText::Discard);
    }

    #[test]
    fn policies_parse_from_snake_case() {
        let yaml = "schema:\n  property_scope: own\ntranslation:\n  trailing_text: reject\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.schema.property_scope, PropertyScope::Own);
        assert_eq!(cfg.translation.trailing_text, TrailingText::Reject);
    }

    #[test]
    fn generation_params_follow_translation_section() {
        let mut t = TranslationConfig::default();
        t.timeout_secs = 0;
        t.max_tokens = 64;
        let p = t.generation_params();
        assert_eq!(p.max_tokens, 64);
        assert_eq!(p.timeout, None);
        assert_eq!(p.stop, vec!["}".to_string()]);
    }

    #[test]
    fn load_resolves_paths_relative_to_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flowport.yaml");
        std::fs::write(&path, "input: wf.xml\noutput: /tmp/out.json\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.input, dir.path().join("wf.xml"));
        assert_eq!(cfg.output, PathBuf::from("/tmp/out.json"));
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, FlowportError::Config(_)));
        let cfg = Config::load_or_default(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(cfg.input, PathBuf::from("workflow.xml"));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("flowport.yaml");
        let mut cfg = Config::default();
        cfg.backend = BackendConfig::dry_run();
        cfg.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.backend.kind(), "static");
    }

    #[test]
    fn default_config_has_no_errors() {
        let warnings = Config::default().validate();
        assert!(
            warnings.iter().all(|w| w.level != WarnLevel::Error),
            "{warnings:?}"
        );
    }

    #[test]
    fn validate_flags_bad_values() {
        let mut cfg = Config::default();
        cfg.schema.property_tag = cfg.schema.action_tag.clone();
        cfg.translation.max_tokens = 0;
        cfg.translation.temperature = 3.0;
        cfg.translation.stop = vec![];
        cfg.translation.prompt_template = Some("no placeholder".into());
        let warnings = cfg.validate();
        let errors = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .count();
        assert_eq!(errors, 4, "{warnings:?}");
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Warning && w.message.contains("stop")));
    }
}
