// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Single-purpose regex cleaning operators.
//!
//! Every micro-operation is a [`TextOperator`] built from a config map. All
//! of them accept `replacement_text` (what a match is replaced with); some
//! take extra flags, documented on their builder.

use regex::{Regex, RegexBuilder};
use std::sync::Arc;

use crate::config::{ConfigMap, Constructor};
use crate::errors::{ConfigError, Result};
use crate::traits::{Describe, Lang, TextOperator};

/// Names of every built-in micro-operation, in cleaning order.
pub const MICRO_OPS: &[&str] = &[
    "remove_html_tags",
    "remove_urls",
    "remove_emails",
    "remove_phone_numbers",
    "remove_footer_header",
    "remove_emoticons",
    "remove_emoji",
    "remove_special_chars",
    "remove_non_printable",
    "remove_extra_spaces",
];

/// Namespace under which [`resolve`] is registered as a lazy fallback.
pub const NAMESPACE: &str = "corpusmill::microops";

/// Build the micro-operation `name` from `config`.
pub fn build(name: &str, config: &ConfigMap) -> Result<Box<dyn TextOperator>> {
    let op: Box<dyn TextOperator> = match name {
        "remove_html_tags" => Box::new(remove_html_tags(config)?),
        "remove_urls" => Box::new(remove_urls(config)?),
        "remove_emails" => Box::new(remove_emails(config)?),
        "remove_phone_numbers" => Box::new(remove_phone_numbers(config)?),
        "remove_footer_header" => Box::new(remove_footer_header(config)?),
        "remove_emoticons" => Box::new(remove_emoticons(config)?),
        "remove_emoji" => Box::new(remove_emoji(config)?),
        "remove_special_chars" => Box::new(RemoveSpecialChars::new(config)?),
        "remove_non_printable" => Box::new(remove_non_printable(config)?),
        "remove_extra_spaces" => Box::new(RemoveExtraSpaces::new()?),
        other => {
            return Err(ConfigError::invalid("micro_op", format!("unknown micro-operation '{}'", other)).into())
        }
    };
    Ok(op)
}

/// Fallback resolver: a constructor for any built-in name.
pub fn resolve(name: &str) -> Option<Constructor<Box<dyn TextOperator>>> {
    let name = MICRO_OPS.iter().find(|candidate| **candidate == name)?;
    Some(Arc::new(move |config: &ConfigMap| build(name, config)))
}

fn config_str(config: &ConfigMap, key: &str, default: &str) -> String {
    config
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or(default)
        .to_string()
}

fn config_bool(config: &ConfigMap, key: &str, default: bool) -> bool {
    config.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

fn compile(op: &str, pattern: &str, case_insensitive: bool, multi_line: bool) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .multi_line(multi_line)
        .build()
        .map_err(|e| ConfigError::invalid(op, format!("bad pattern: {}", e)).into())
}

/// Replaces every match of each pattern, in order.
pub struct RegexMicroOp {
    name: &'static str,
    zh: &'static str,
    en: &'static str,
    patterns: Vec<Regex>,
    replacement: String,
    /// Collapse runs of spaces left behind by removals.
    squeeze_spaces: Option<Regex>,
}

impl RegexMicroOp {
    fn new(
        name: &'static str,
        descriptions: (&'static str, &'static str),
        patterns: &[&str],
        replacement: String,
        case_insensitive: bool,
        multi_line: bool,
    ) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| compile(name, p, case_insensitive, multi_line))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            name,
            zh: descriptions.0,
            en: descriptions.1,
            patterns,
            replacement,
            squeeze_spaces: None,
        })
    }

    fn squeezing(mut self) -> Result<Self> {
        self.squeeze_spaces = Some(compile(self.name, r"[ \t]{2,}", false, false)?);
        Ok(self)
    }
}

impl Describe for RegexMicroOp {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self, lang: Lang) -> String {
        match lang {
            Lang::Zh => self.zh.to_string(),
            Lang::En => self.en.to_string(),
        }
    }
}

impl TextOperator for RegexMicroOp {
    fn run(&self, input: &str) -> Result<String> {
        let mut text = input.to_string();
        for pattern in &self.patterns {
            text = pattern.replace_all(&text, self.replacement.as_str()).into_owned();
        }
        if let Some(squeeze) = &self.squeeze_spaces {
            text = squeeze.replace_all(&text, " ").into_owned();
        }
        Ok(text)
    }
}

/// `replace_with_space` (default true) replaces tags with a space so
/// neighbouring words stay apart. `remove_style_script` (default true)
/// drops script and style bodies too.
pub fn remove_html_tags(config: &ConfigMap) -> Result<RegexMicroOp> {
    let default = if config_bool(config, "replace_with_space", true) { " " } else { "" };
    let mut patterns = Vec::new();
    if config_bool(config, "remove_style_script", true) {
        patterns.push(r"(?is)<script\b[^>]*>.*?</script\s*>");
        patterns.push(r"(?is)<style\b[^>]*>.*?</style\s*>");
    }
    patterns.push(r"(?s)<!--.*?-->");
    patterns.push(r"<[^>]*>");

    RegexMicroOp::new(
        "remove_html_tags",
        ("移除文本中的HTML标签", "Remove HTML tags, comments, scripts and styles"),
        &patterns,
        config_str(config, "replacement_text", default),
        false,
        false,
    )?
    .squeezing()
}

pub fn remove_urls(config: &ConfigMap) -> Result<RegexMicroOp> {
    RegexMicroOp::new(
        "remove_urls",
        ("移除文本中的URL链接", "Remove URLs with a scheme or a www. prefix"),
        &[
            r#"(?:https?|ftps?|sftp|ssh|file|data|mailto|tel|sms)://[^\s<>"{}|\\^`\[\]]+"#,
            r#"\bwww\.[a-zA-Z0-9-]+(?:\.[a-zA-Z0-9-]+)+[^\s<>"{}|\\^`\[\]]*"#,
        ],
        config_str(config, "replacement_text", ""),
        true,
        false,
    )
}

pub fn remove_emails(config: &ConfigMap) -> Result<RegexMicroOp> {
    RegexMicroOp::new(
        "remove_emails",
        ("移除文本中的电子邮件地址", "Remove email addresses"),
        &[r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b"],
        config_str(config, "replacement_text", ""),
        false,
        false,
    )
}

pub fn remove_phone_numbers(config: &ConfigMap) -> Result<RegexMicroOp> {
    RegexMicroOp::new(
        "remove_phone_numbers",
        ("移除文本中的电话号码", "Remove US and international phone numbers"),
        &[
            r"\+\d{1,3}[-.\s]?\(?\d{1,4}\)?(?:[-.\s]?\d{2,4}){2,4}\b",
            r"(?:\b1[-.\s]?)?(?:\(\d{3}\)|\b\d{3})[-.\s]?\d{3}[-.\s]?\d{4}\b",
            r"\b1[3-9]\d{9}\b",
        ],
        config_str(config, "replacement_text", ""),
        false,
        false,
    )
}

/// Flags `remove_page_numbers`, `remove_copyright` and `remove_navigation`
/// (all default true) select which line families are dropped.
pub fn remove_footer_header(config: &ConfigMap) -> Result<RegexMicroOp> {
    let mut patterns = Vec::new();
    if config_bool(config, "remove_page_numbers", true) {
        patterns.extend_from_slice(&[
            r"^[ \t]*page[ \t]+\d+[ \t]*(?:of[ \t]+\d+[ \t]*)?$\n?",
            r"^[ \t]*\d+[ \t]*$\n?",
            r"^[ \t]*-[ \t]*\d+[ \t]*-[ \t]*$\n?",
            r"^[ \t]*\[[ \t]*\d+[ \t]*\][ \t]*$\n?",
            r"^[ \t]*\d+[ \t]*/[ \t]*\d+[ \t]*$\n?",
            r"^[ \t]*\d+[ \t]+of[ \t]+\d+[ \t]*$\n?",
        ]);
    }
    if config_bool(config, "remove_copyright", true) {
        patterns.extend_from_slice(&[
            r"^[ \t]*(?:©|copyright|\(c\)).*\d{4}.*$\n?",
            r"^[ \t]*all rights reserved.*$\n?",
            r"^[ \t]*proprietary and confidential.*$\n?",
        ]);
    }
    if config_bool(config, "remove_navigation", true) {
        patterns.extend_from_slice(&[
            r"^[ \t]*next[ \t]*\|[ \t]*previous[ \t]*$\n?",
            r"^[ \t]*home[ \t]*\|[ \t]*back[ \t]*\|[ \t]*forward[ \t]*$\n?",
            r"^[ \t]*(?:click here|continue reading|read more|back to top)\b.*$\n?",
            r"^[ \t]*table of contents[ \t]*$\n?",
        ]);
    }
    patterns.extend_from_slice(&[
        r"^[ \t]*(?:printed on|generated on|last updated)\b.*\d{4}.*$\n?",
    ]);

    RegexMicroOp::new(
        "remove_footer_header",
        ("移除页眉页脚、页码和版权声明", "Remove page numbers, copyright lines and navigation"),
        &patterns,
        config_str(config, "replacement_text", ""),
        true,
        true,
    )
}

pub fn remove_emoticons(config: &ConfigMap) -> Result<RegexMicroOp> {
    RegexMicroOp::new(
        "remove_emoticons",
        ("移除文本中的颜文字表情", "Remove ASCII emoticons such as :) and <3"),
        &[
            r"(?:^|\s)(?:[:;=8][-']?[)(\]\[DdPpOo/\\|*]|[xX][-']?[D)(]|<3|</3|\^_?\^|>_<|[oO]_[oO]|\\o/)(?:\s|$)",
        ],
        config_str(config, "replacement_text", " "),
        false,
        false,
    )?
    .squeezing()
}

pub fn remove_emoji(config: &ConfigMap) -> Result<RegexMicroOp> {
    RegexMicroOp::new(
        "remove_emoji",
        ("移除文本中的Emoji表情", "Remove emoji, flags, skin tones and joiners"),
        &[
            concat!(
                "[",
                "\u{1F600}-\u{1F64F}",
                "\u{1F300}-\u{1F5FF}",
                "\u{1F680}-\u{1F6FF}",
                "\u{1F1E0}-\u{1F1FF}",
                "\u{1F700}-\u{1F77F}",
                "\u{1F780}-\u{1F7FF}",
                "\u{1F800}-\u{1F8FF}",
                "\u{1F900}-\u{1F9FF}",
                "\u{1FA00}-\u{1FAFF}",
                "\u{2600}-\u{26FF}",
                "\u{2700}-\u{27BF}",
                "\u{1F000}-\u{1F02F}",
                "\u{1F0A0}-\u{1F0FF}",
                "\u{1F100}-\u{1F1FF}",
                "\u{1F3FB}-\u{1F3FF}",
                "\u{200D}",
                "\u{FE00}-\u{FE0F}",
                "\u{20E3}",
                "\u{E0020}-\u{E007F}",
                "]+",
            ),
        ],
        config_str(config, "replacement_text", ""),
        false,
        false,
    )
}

/// Control characters, zero-width characters and the byte order mark.
/// `preserve_zero_width` keeps zero-width characters.
pub fn remove_non_printable(config: &ConfigMap) -> Result<RegexMicroOp> {
    let mut patterns = vec![r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F-\x9F]", "\u{FEFF}"];
    if !config_bool(config, "preserve_zero_width", false) {
        patterns.push("[\u{200B}\u{200C}\u{200E}\u{200F}\u{2060}]");
    }
    RegexMicroOp::new(
        "remove_non_printable",
        ("移除文本中的不可打印字符", "Remove control, zero-width and BOM characters"),
        &patterns,
        config_str(config, "replacement_text", ""),
        false,
        false,
    )
}

/// ASCII punctuation outside the preserved groups, followed by whitespace
/// normalization.
///
/// Preserved groups: `preserve_basic_punctuation` (`.,!?;:`, default true),
/// `preserve_quotes` (default true), `preserve_parentheses` (default true),
/// `preserve_math_symbols` (default false).
pub struct RemoveSpecialChars {
    removal: Option<Regex>,
    whitespace: Regex,
    replacement: String,
}

impl RemoveSpecialChars {
    pub fn new(config: &ConfigMap) -> Result<Self> {
        let mut preserved = String::new();
        if config_bool(config, "preserve_basic_punctuation", true) {
            preserved.push_str(".,!?;:");
        }
        if config_bool(config, "preserve_quotes", true) {
            preserved.push_str("'\"`");
        }
        if config_bool(config, "preserve_parentheses", true) {
            preserved.push_str("()[]{}<>");
        }
        if config_bool(config, "preserve_math_symbols", false) {
            preserved.push_str("+-*/=<>%");
        }

        let removed: String = (0x21u8..0x7F)
            .map(char::from)
            .filter(|c| c.is_ascii_punctuation() && !preserved.contains(*c))
            .map(|c| regex::escape(&c.to_string()))
            .collect();
        let removal = if removed.is_empty() {
            None
        } else {
            Some(compile("remove_special_chars", &format!("[{}]+", removed), false, false)?)
        };

        Ok(Self {
            removal,
            whitespace: compile("remove_special_chars", r"\s+", false, false)?,
            replacement: config_str(config, "replacement_text", ""),
        })
    }
}

impl Describe for RemoveSpecialChars {
    fn name(&self) -> &str {
        "remove_special_chars"
    }

    fn description(&self, lang: Lang) -> String {
        match lang {
            Lang::Zh => "移除文本中的特殊字符，可配置保留规则".to_string(),
            Lang::En => "Remove special characters with configurable preservation".to_string(),
        }
    }
}

impl TextOperator for RemoveSpecialChars {
    fn run(&self, input: &str) -> Result<String> {
        let text = match &self.removal {
            Some(removal) => removal.replace_all(input, self.replacement.as_str()).into_owned(),
            None => input.to_string(),
        };
        Ok(self.whitespace.replace_all(&text, " ").trim().to_string())
    }
}

/// Collapses blank-line runs to one blank line and space runs to one space,
/// and strips trailing spaces. Leading indentation is kept.
pub struct RemoveExtraSpaces {
    blank_lines: Regex,
    inner_spaces: Regex,
    trailing: Regex,
}

impl RemoveExtraSpaces {
    pub fn new() -> Result<Self> {
        Ok(Self {
            blank_lines: compile("remove_extra_spaces", r"\n[ \t]*\n(?:[ \t]*\n)+", false, false)?,
            inner_spaces: compile("remove_extra_spaces", r"(\S)[ \t]{2,}", false, false)?,
            trailing: compile("remove_extra_spaces", r"[ \t]+$", false, true)?,
        })
    }
}

impl Describe for RemoveExtraSpaces {
    fn name(&self) -> &str {
        "remove_extra_spaces"
    }

    fn description(&self, lang: Lang) -> String {
        match lang {
            Lang::Zh => "移除文本中多余的空格和空行".to_string(),
            Lang::En => "Collapse repeated spaces and blank lines".to_string(),
        }
    }
}

impl TextOperator for RemoveExtraSpaces {
    fn run(&self, input: &str) -> Result<String> {
        let text = input.replace('\r', "");
        let text = self.trailing.replace_all(&text, "");
        let text = self.blank_lines.replace_all(&text, "\n\n");
        let text = self.inner_spaces.replace_all(&text, "$1 ");
        Ok(text.trim_matches('\n').to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(name: &str, config: ConfigMap, input: &str) -> String {
        build(name, &config).unwrap().run(input).unwrap()
    }

    #[test]
    fn test_micro_ops() {
        struct TestCase {
            name: &'static str,
            op: &'static str,
            input: &'static str,
            expected: &'static str,
        }

        let test_cases = vec![
            TestCase {
                name: "html tags become spaces",
                op: "remove_html_tags",
                input: "<p>Hello</p><b>world</b>",
                expected: " Hello world ",
            },
            TestCase {
                name: "script bodies are dropped",
                op: "remove_html_tags",
                input: "a<script>var x = 1;</script>b<!-- note -->c",
                expected: "a b c",
            },
            TestCase {
                name: "scheme and www urls",
                op: "remove_urls",
                input: "see https://example.com/a?b=1 and www.example.org/x now",
                expected: "see  and  now",
            },
            TestCase {
                name: "emails",
                op: "remove_emails",
                input: "mail me at jane.doe+test@example.co.uk today",
                expected: "mail me at  today",
            },
            TestCase {
                name: "us phone numbers",
                op: "remove_phone_numbers",
                input: "call (555) 123-4567 or 555.123.4567",
                expected: "call  or ",
            },
            TestCase {
                name: "international phone numbers",
                op: "remove_phone_numbers",
                input: "dial +44 20 7946 0958 please",
                expected: "dial  please",
            },
            TestCase {
                name: "footer lines",
                op: "remove_footer_header",
                input: "Intro\nPage 3\nCopyright 2024 Acme\nBody\n12\n",
                expected: "Intro\nBody\n",
            },
            TestCase {
                name: "emoticons",
                op: "remove_emoticons",
                input: "great :) see you ;-) soon <3",
                expected: "great see you soon ",
            },
            TestCase {
                name: "emoji and joiners",
                op: "remove_emoji",
                input: "ok 👍🏽 done 👨\u{200D}👩\u{200D}👧 ✅",
                expected: "ok  done  ",
            },
            TestCase {
                name: "special chars keep basic punctuation",
                op: "remove_special_chars",
                input: "Price: #42 @ 50% off!   (today)",
                expected: "Price: 42 50 off! (today)",
            },
            TestCase {
                name: "non printable and bom",
                op: "remove_non_printable",
                input: "\u{FEFF}te\u{0007}xt\u{200B}!",
                expected: "text!",
            },
            TestCase {
                name: "extra spaces and blank lines",
                op: "remove_extra_spaces",
                input: "a   b  \n\n\n\nc\r\n  indented",
                expected: "a b\n\nc\n  indented",
            },
        ];

        for tc in test_cases {
            assert_eq!(
                run(tc.op, ConfigMap::new(), tc.input),
                tc.expected,
                "mismatch for '{}'",
                tc.name
            );
        }
    }

    #[test]
    fn test_replacement_text_is_configurable() {
        let mut config = ConfigMap::new();
        config.insert("replacement_text".into(), json!("[EMAIL]"));
        assert_eq!(
            run("remove_emails", config, "write a@b.io now"),
            "write [EMAIL] now"
        );
    }

    #[test]
    fn test_flags_change_behavior() {
        let mut config = ConfigMap::new();
        config.insert("remove_page_numbers".into(), json!(false));
        assert_eq!(
            run("remove_footer_header", config, "Page 3\nAll rights reserved.\n"),
            "Page 3\n"
        );

        let mut config = ConfigMap::new();
        config.insert("preserve_zero_width".into(), json!(true));
        assert_eq!(run("remove_non_printable", config, "a\u{200B}b"), "a\u{200B}b");
    }

    #[test]
    fn test_resolver_knows_only_builtins() {
        assert!(resolve("remove_urls").is_some());
        assert!(resolve("remove_everything").is_none());
        assert!(build("remove_everything", &ConfigMap::new()).is_err());
        for name in MICRO_OPS {
            let op = build(name, &ConfigMap::new()).unwrap();
            assert_eq!(op.name(), *name);
            assert!(!op.description(Lang::Zh).is_empty());
        }
    }
}
