// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;

use crate::config::{CleaningSettings, ConfigMap, Registry};
use crate::errors::{ConfigError, CorpusError, Result};
use crate::operators::microops::MICRO_OPS;
use crate::traits::{Describe, Lang, PipelineBlueprint, TextOperator};

/// Regex cleaning chain selected by the `enable_*` flags of
/// [`CleaningSettings`].
///
/// Operators run in the fixed order of [`MICRO_OPS`]. A micro-operation's
/// own options go in a nested object named after it:
///
/// ```yaml
/// enable_html_removal: true
/// remove_html_tags:
///   replace_with_space: false
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CleaningPipeline;

impl CleaningPipeline {
    pub fn new() -> Self {
        Self
    }
}

fn enabled(settings: &CleaningSettings, micro_op: &str) -> bool {
    match micro_op {
        "remove_html_tags" => settings.enable_html_removal,
        "remove_urls" => settings.enable_url_removal,
        "remove_emails" => settings.enable_email_removal,
        "remove_phone_numbers" => settings.enable_phone_removal,
        "remove_footer_header" => settings.enable_footer_header_removal,
        "remove_emoticons" => settings.enable_emoticon_removal,
        "remove_emoji" => settings.enable_emoji_removal,
        "remove_special_chars" => settings.enable_special_char_removal,
        "remove_non_printable" => settings.enable_non_printable_removal,
        "remove_extra_spaces" => settings.enable_extra_space_removal,
        _ => false,
    }
}

impl Describe for CleaningPipeline {
    fn name(&self) -> &str {
        "cleaning_pipe"
    }

    fn description(&self, lang: Lang) -> String {
        match lang {
            Lang::Zh => "文本清洗工作流".to_string(),
            Lang::En => "A text cleaning pipeline.".to_string(),
        }
    }
}

impl PipelineBlueprint for CleaningPipeline {
    fn configure_operators(
        &self,
        config: &ConfigMap,
        micro_ops: &Registry<Box<dyn TextOperator>>,
    ) -> Result<Vec<Box<dyn TextOperator>>> {
        let settings: CleaningSettings = serde_json::from_value(Value::Object(config.clone()))
            .map_err(|e| ConfigError::invalid("cleaning", e.to_string()))?;

        MICRO_OPS
            .iter()
            .filter(|name| enabled(&settings, name))
            .map(|name| {
                let options = match config.get(*name) {
                    Some(Value::Object(options)) => options.clone(),
                    Some(_) => {
                        return Err(CorpusError::Config(ConfigError::invalid(
                            format!("cleaning.{}", name),
                            "options must be a mapping",
                        )))
                    }
                    None => ConfigMap::new(),
                };
                micro_ops.create(name, &options)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryKind;
    use crate::operators::microops;
    use serde_json::json;

    fn micro_ops() -> Registry<Box<dyn TextOperator>> {
        let registry = Registry::new("micro_ops", RegistryKind::Operator);
        registry.add_fallback_namespace(microops::NAMESPACE, microops::resolve);
        registry
    }

    fn names(ops: &[Box<dyn TextOperator>]) -> Vec<String> {
        ops.iter().map(|op| op.name().to_string()).collect()
    }

    #[test]
    fn test_flags_select_operators() {
        struct TestCase {
            name: &'static str,
            config: Value,
            expected: Vec<&'static str>,
        }

        let test_cases = vec![
            TestCase {
                name: "defaults",
                config: json!({}),
                expected: vec![
                    "remove_emoticons",
                    "remove_emoji",
                    "remove_non_printable",
                    "remove_extra_spaces",
                ],
            },
            TestCase {
                name: "html and urls in cleaning order",
                config: json!({
                    "enable_url_removal": true,
                    "enable_html_removal": true,
                    "enable_emoticon_removal": false,
                    "enable_emoji_removal": false,
                    "enable_non_printable_removal": false,
                    "enable_extra_space_removal": false,
                }),
                expected: vec!["remove_html_tags", "remove_urls"],
            },
            TestCase {
                name: "everything off",
                config: json!({
                    "enable_emoticon_removal": false,
                    "enable_emoji_removal": false,
                    "enable_non_printable_removal": false,
                    "enable_extra_space_removal": false,
                }),
                expected: vec![],
            },
        ];

        let registry = micro_ops();
        for tc in test_cases {
            let Value::Object(config) = tc.config else {
                panic!("config must be an object");
            };
            let ops = CleaningPipeline::new()
                .configure_operators(&config, &registry)
                .unwrap();
            assert_eq!(names(&ops), tc.expected, "operators mismatch for '{}'", tc.name);
        }
    }

    #[test]
    fn test_nested_options_reach_micro_op() {
        let Value::Object(config) = json!({
            "enable_html_removal": true,
            "enable_emoticon_removal": false,
            "enable_emoji_removal": false,
            "enable_non_printable_removal": false,
            "enable_extra_space_removal": false,
            "remove_html_tags": {"replacement_text": "|"},
        }) else {
            panic!("config must be an object");
        };
        let ops = CleaningPipeline::new()
            .configure_operators(&config, &micro_ops())
            .unwrap();
        assert_eq!(ops[0].run("a<br>b").unwrap(), "a|b");
    }

    #[test]
    fn test_bad_options_are_config_errors() {
        let Value::Object(config) = json!({"remove_emoji": "loud"}) else {
            panic!("config must be an object");
        };
        let result = CleaningPipeline::new().configure_operators(&config, &micro_ops());
        assert!(matches!(result, Err(CorpusError::Config(_))));
    }
}
