// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::consts::*;
use crate::errors::{ConfigError, RetryPolicy};
use crate::engine::RecordFailurePolicy;
use crate::storage::SnapshotFormat;
use crate::text::{ShortChunkPolicy, SplitMethod};

/// Operator-level configuration: a flat JSON object merged key by key.
pub type ConfigMap = serde_json::Map<String, Value>;

/// Complete configuration of a corpus run.
///
/// Every section has defaults, so a config file only needs to name what it
/// changes. Files are deep-merged over [`Settings::default`].
///
/// # Example
/// ```yaml
/// limit: 100
/// text_splitter:
///   chunk_size: 1024
///   split_method: markdown
/// llm_cleaner:
///   llm:
///     base_url: http://localhost:8000/v1/chat/completions
///     model_name: qwen2.5-7b-instruct
/// storage:
///   cache_type: jsonl
///   enable_compression: true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub max_workers: Option<usize>,
    pub limit: usize,
    pub text_splitter: TextSplitterSettings,
    pub llm_cleaner: LlmCleanerSettings,
    pub cleaning: CleaningSettings,
    pub storage: StorageSettings,
    pub processing: ProcessingSettings,
    pub retry: RetrySettings,
    pub registry: RegistrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_workers: None,
            limit: 0,
            text_splitter: TextSplitterSettings::default(),
            llm_cleaner: LlmCleanerSettings::default(),
            cleaning: CleaningSettings::default(),
            storage: StorageSettings::default(),
            processing: ProcessingSettings::default(),
            retry: RetrySettings::default(),
            registry: RegistrySettings::default(),
        }
    }
}

impl Settings {
    /// Configured worker count, or the machine default.
    pub fn get_max_workers(&self) -> usize {
        self.max_workers.unwrap_or_else(default_max_workers).max(1)
    }

    /// Apply `overrides` (any JSON-shaped value) on top of these settings.
    pub fn merged_with(&self, overrides: &Value) -> Result<Settings, ConfigError> {
        let mut base = serde_json::to_value(self).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<defaults>"),
            message: e.to_string(),
        })?;
        deep_merge(&mut base, overrides);
        serde_json::from_value(base).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<overrides>"),
            message: e.to_string(),
        })
    }

    /// Section as an operator config map, with the run-wide worker and limit
    /// settings folded in.
    pub fn section_map<T: Serialize>(&self, section: &T) -> ConfigMap {
        let mut map = match serde_json::to_value(section) {
            Ok(Value::Object(map)) => map,
            _ => ConfigMap::new(),
        };
        map.insert("max_workers".into(), Value::from(self.get_max_workers()));
        map.insert("limit".into(), Value::from(self.limit));
        map
    }
}

/// Adaptive chunker settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextSplitterSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub split_method: SplitMethod,
    pub min_tokens_per_chunk: usize,
    pub short_chunk_policy: ShortChunkPolicy,
    /// `tokenizer.json` to count tokens with; whitespace counting when absent
    pub tokenizer_path: Option<PathBuf>,
    /// Longest sequence the tokenizer accepts in one piece
    pub model_max_length: usize,
}

impl Default for TextSplitterSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            split_method: SplitMethod::Markdown,
            min_tokens_per_chunk: DEFAULT_MIN_TOKENS_PER_CHUNK,
            short_chunk_policy: ShortChunkPolicy::Drop,
            tokenizer_path: None,
            model_max_length: DEFAULT_MODEL_MAX_LENGTH,
        }
    }
}

/// LLM completion endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    /// Falls back to the `CORPUSMILL_API_KEY` environment variable when empty
    pub api_key: String,
    pub model_name: String,
    pub temperature: f64,
    pub top_p: Option<f64>,
    pub top_k: Option<u32>,
    /// Sent as `chat_template_kwargs.enable_thinking` when set
    pub enable_thinking: Option<bool>,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1/chat/completions".to_string(),
            api_key: String::new(),
            model_name: "default".to_string(),
            temperature: DEFAULT_LLM_TEMPERATURE,
            top_p: None,
            top_k: None,
            enable_thinking: None,
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
        }
    }
}

impl LlmSettings {
    pub fn resolved_api_key(&self) -> String {
        if self.api_key.is_empty() {
            std::env::var("CORPUSMILL_API_KEY").unwrap_or_default()
        } else {
            self.api_key.clone()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// LLM cleaning stage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmCleanerSettings {
    pub llm: LlmSettings,
    pub enable_token_tracking: bool,
    pub reset_tokens_on_start: bool,
}

impl Default for LlmCleanerSettings {
    fn default() -> Self {
        Self {
            llm: LlmSettings::default(),
            enable_token_tracking: true,
            reset_tokens_on_start: true,
        }
    }
}

/// Flags selecting the micro-operations of the cleaning pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningSettings {
    pub enable_html_removal: bool,
    pub enable_url_removal: bool,
    pub enable_email_removal: bool,
    pub enable_phone_removal: bool,
    pub enable_footer_header_removal: bool,
    pub enable_emoticon_removal: bool,
    pub enable_emoji_removal: bool,
    pub enable_special_char_removal: bool,
    pub enable_non_printable_removal: bool,
    pub enable_extra_space_removal: bool,
    pub record_failure_policy: RecordFailurePolicy,
}

impl Default for CleaningSettings {
    fn default() -> Self {
        Self {
            enable_html_removal: false,
            enable_url_removal: false,
            enable_email_removal: false,
            enable_phone_removal: false,
            enable_footer_header_removal: false,
            enable_emoticon_removal: true,
            enable_emoji_removal: true,
            enable_special_char_removal: false,
            enable_non_printable_removal: true,
            enable_extra_space_removal: true,
            record_failure_policy: RecordFailurePolicy::RevertRecord,
        }
    }
}

/// Snapshot storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub cache_type: SnapshotFormat,
    pub enable_compression: bool,
    pub validate_on_write: bool,
    pub file_name_prefix: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            cache_type: SnapshotFormat::JsonLines,
            enable_compression: false,
            validate_on_write: true,
            file_name_prefix: DEFAULT_CACHE_PREFIX.to_string(),
        }
    }
}

/// Raw-corpus directory handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub auto_detect_raw_corpus: bool,
    pub supported_extensions: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            auto_detect_raw_corpus: true,
            supported_extensions: vec![".txt".to_string(), ".md".to_string()],
            exclude_patterns: vec![".bak".to_string()],
        }
    }
}

/// Backoff settings, converted into a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_secs: DEFAULT_BASE_DELAY_SECS,
            max_delay_secs: DEFAULT_MAX_DELAY_SECS,
            exponential_base: DEFAULT_EXPONENTIAL_BASE,
            jitter: true,
        }
    }
}

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs_f64(self.max_delay_secs.max(0.0)),
            exponential_base: self.exponential_base,
            jitter: self.jitter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub cache_ttl_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
        }
    }
}

/// Recursively merge `overrides` into `base`. Objects merge key by key;
/// any other value replaces what was there.
pub fn deep_merge(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            for (key, value) in override_map {
                match base_map.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

/// Load settings from a YAML (`.yaml`/`.yml`) or TOML (`.toml`) file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    if content.trim().is_empty() {
        return Ok(Settings::default());
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let overrides: Value = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        "toml" => toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
    };

    // A YAML document holding only comments parses as null
    if overrides.is_null() {
        return Ok(Settings::default());
    }

    Settings::default()
        .merged_with(&overrides)
        .map_err(|e| match e {
            ConfigError::Parse { message, .. } => parse_error(message),
            other => other,
        })
}

/// Load settings and run every validation rule over them.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Settings, ConfigError> {
    let settings = load_config(path)?;
    validate_config(&settings).map_err(|errors| ConfigError::Validation {
        problems: errors.iter().map(|e| e.to_string()).collect(),
    })?;
    Ok(settings)
}

/// Check value ranges, returning every problem found.
pub fn validate_config(settings: &Settings) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let splitter = &settings.text_splitter;

    if settings.max_workers == Some(0) {
        errors.push(ConfigError::invalid("max_workers", "must be at least 1"));
    }
    if splitter.chunk_size == 0 {
        errors.push(ConfigError::invalid("text_splitter.chunk_size", "must be greater than 0"));
    }
    if splitter.chunk_overlap >= splitter.chunk_size && splitter.chunk_size > 0 {
        errors.push(ConfigError::invalid(
            "text_splitter.chunk_overlap",
            format!("must be smaller than chunk_size ({})", splitter.chunk_size),
        ));
    }
    if splitter.split_method == SplitMethod::Semantic {
        errors.push(ConfigError::invalid(
            "text_splitter.split_method",
            "semantic splitting is not supported",
        ));
    }
    if splitter.model_max_length == 0 {
        errors.push(ConfigError::invalid(
            "text_splitter.model_max_length",
            "must be greater than 0",
        ));
    }
    if splitter.min_tokens_per_chunk > splitter.chunk_size {
        errors.push(ConfigError::invalid(
            "text_splitter.min_tokens_per_chunk",
            "must not exceed chunk_size",
        ));
    }

    let llm = &settings.llm_cleaner.llm;
    if llm.base_url.trim().is_empty() {
        errors.push(ConfigError::invalid("llm_cleaner.llm.base_url", "must not be empty"));
    }
    if llm.model_name.trim().is_empty() {
        errors.push(ConfigError::invalid("llm_cleaner.llm.model_name", "must not be empty"));
    }
    if !(0.0..=MAX_LLM_TEMPERATURE).contains(&llm.temperature) {
        errors.push(ConfigError::invalid(
            "llm_cleaner.llm.temperature",
            format!("must be within [0, {}]", MAX_LLM_TEMPERATURE),
        ));
    }
    if let Some(top_p) = llm.top_p {
        if !(0.0..=1.0).contains(&top_p) {
            errors.push(ConfigError::invalid("llm_cleaner.llm.top_p", "must be within [0, 1]"));
        }
    }

    if !settings.storage.cache_type.is_supported() {
        errors.push(ConfigError::invalid(
            "storage.cache_type",
            format!("'{}' snapshots are not supported", settings.storage.cache_type),
        ));
    }
    if settings.storage.file_name_prefix.trim().is_empty() {
        errors.push(ConfigError::invalid("storage.file_name_prefix", "must not be empty"));
    }
    if settings.processing.supported_extensions.is_empty() {
        errors.push(ConfigError::invalid(
            "processing.supported_extensions",
            "must list at least one extension",
        ));
    }

    let retry = &settings.retry;
    if retry.exponential_base < 1.0 {
        errors.push(ConfigError::invalid("retry.exponential_base", "must be at least 1.0"));
    }
    if retry.base_delay_secs < 0.0 || retry.max_delay_secs < retry.base_delay_secs {
        errors.push(ConfigError::invalid(
            "retry.max_delay_secs",
            "delays must be non-negative with max_delay_secs >= base_delay_secs",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_partial_yaml_merges_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "run.yaml",
            r#"
limit: 25
text_splitter:
  chunk_size: 1024
  split_method: recursive
storage:
  enable_compression: true
"#,
        );

        let settings = load_config(&path).unwrap();
        assert_eq!(settings.limit, 25);
        assert_eq!(settings.text_splitter.chunk_size, 1024);
        assert_eq!(settings.text_splitter.split_method, SplitMethod::Recursive);
        // untouched keys in a touched section keep their defaults
        assert_eq!(settings.text_splitter.chunk_overlap, DEFAULT_CHUNK_OVERLAP);
        assert!(settings.storage.enable_compression);
        assert_eq!(settings.storage.cache_type, SnapshotFormat::JsonLines);
    }

    #[test]
    fn test_toml_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "run.toml",
            r#"
max_workers = 2

[llm_cleaner.llm]
model_name = "qwen"
temperature = 0.2
"#,
        );

        let settings = load_config(&path).unwrap();
        assert_eq!(settings.get_max_workers(), 2);
        assert_eq!(settings.llm_cleaner.llm.model_name, "qwen");
        assert_eq!(settings.llm_cleaner.llm.temperature, 0.2);
    }

    #[test]
    fn test_empty_yaml_is_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "empty.yaml", "");
        assert_eq!(load_config(&path).unwrap(), Settings::default());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "run.ini", "limit=1");
        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ref ext) if ext == "ini"));
    }

    #[test]
    fn test_validation_rules() {
        struct TestCase {
            name: &'static str,
            overrides: Value,
            expected_field: Option<&'static str>,
        }

        let test_cases = vec![
            TestCase {
                name: "defaults are valid",
                overrides: json!({}),
                expected_field: None,
            },
            TestCase {
                name: "zero chunk size",
                overrides: json!({"text_splitter": {"chunk_size": 0, "min_tokens_per_chunk": 0}}),
                expected_field: Some("text_splitter.chunk_size"),
            },
            TestCase {
                name: "overlap not smaller than chunk",
                overrides: json!({"text_splitter": {"chunk_size": 100, "chunk_overlap": 100}}),
                expected_field: Some("text_splitter.chunk_overlap"),
            },
            TestCase {
                name: "temperature out of range",
                overrides: json!({"llm_cleaner": {"llm": {"temperature": 3.5}}}),
                expected_field: Some("llm_cleaner.llm.temperature"),
            },
            TestCase {
                name: "pickle snapshots",
                overrides: json!({"storage": {"cache_type": "pickle"}}),
                expected_field: Some("storage.cache_type"),
            },
            TestCase {
                name: "semantic splitting",
                overrides: json!({"text_splitter": {"split_method": "semantic"}}),
                expected_field: Some("text_splitter.split_method"),
            },
            TestCase {
                name: "zero workers",
                overrides: json!({"max_workers": 0}),
                expected_field: Some("max_workers"),
            },
        ];

        for tc in test_cases {
            let settings = Settings::default().merged_with(&tc.overrides).unwrap();
            let result = validate_config(&settings);
            match tc.expected_field {
                None => assert!(result.is_ok(), "'{}' should validate", tc.name),
                Some(field) => {
                    let errors = result.expect_err(tc.name);
                    assert!(
                        errors.iter().any(|e| e.to_string().contains(field)),
                        "'{}' should report '{}', got {:?}",
                        tc.name,
                        field,
                        errors
                    );
                }
            }
        }
    }

    #[test]
    fn test_load_and_validate_reports_all_problems() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "bad.yaml",
            r#"
text_splitter:
  chunk_size: 10
  chunk_overlap: 20
llm_cleaner:
  llm:
    model_name: ""
"#,
        );

        let err = load_and_validate_config(&path).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Configuration validation failed"));
        assert!(msg.contains("chunk_overlap"));
        assert!(msg.contains("model_name"));
    }

    #[test]
    fn test_deep_merge_replaces_scalars_and_arrays() {
        let mut base = json!({"a": {"b": 1, "c": [1, 2]}, "d": "x"});
        deep_merge(&mut base, &json!({"a": {"c": [3]}, "e": true}));
        assert_eq!(base, json!({"a": {"b": 1, "c": [3]}, "d": "x", "e": true}));
    }

    #[test]
    fn test_section_map_carries_run_wide_keys() {
        let settings = Settings {
            max_workers: Some(3),
            limit: 7,
            ..Settings::default()
        };
        let map = settings.section_map(&settings.text_splitter);
        assert_eq!(map.get("max_workers"), Some(&json!(3)));
        assert_eq!(map.get("limit"), Some(&json!(7)));
        assert_eq!(map.get("chunk_size"), Some(&json!(DEFAULT_CHUNK_SIZE)));
    }
}
