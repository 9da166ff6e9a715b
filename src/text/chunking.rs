// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Token-budget-aware chunking.
//!
//! [`AdaptiveChunker::split`] decides per document:
//!
//! 1. Empty or whitespace-only text yields no chunks.
//! 2. Text within `chunk_size` tokens is returned whole, as one chunk.
//! 3. Text within the tokenizer's `model_max_length` goes straight to the
//!    configured method.
//! 4. Longer text is first cut into `ceil(tokens / model_max_length)` pieces
//!    holding an even share of its words; each piece is chunked by the
//!    configured method and the results are concatenated in order.
//!
//! Chunks from steps 3 and 4 scoring fewer than `min_tokens_per_chunk` tokens
//! are then handled by the [`ShortChunkPolicy`].

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use super::tokenizer::{count_tokens, Tokenizer};
use crate::config::TextSplitterSettings;
use crate::errors::{ConfigError, CorpusError, Result};
use crate::observability::messages::text::{DocumentChunked, DocumentPartitioned};

const RECURSIVE_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];
const MAX_HEADER_LEVEL: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    /// Windows of whole words
    Token,
    Sentence,
    /// Paragraph, line, word, then character boundaries
    Recursive,
    /// Sections under H1-H4 headings, recursively split when too long
    Markdown,
    /// Recognised in configuration, never supported
    Semantic,
}

impl SplitMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitMethod::Token => "token",
            SplitMethod::Sentence => "sentence",
            SplitMethod::Recursive => "recursive",
            SplitMethod::Markdown => "markdown",
            SplitMethod::Semantic => "semantic",
        }
    }
}

impl fmt::Display for SplitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to a chunk below `min_tokens_per_chunk`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortChunkPolicy {
    /// The chunk is removed, and its text with it.
    #[default]
    Drop,
    /// The chunk is appended to the chunk before it. A leading short chunk
    /// is carried into the next one. The merged chunk may exceed
    /// `chunk_size`.
    MergeWithPrevious,
}

/// One emitted chunk with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk {
    pub text: String,
    /// Row of the snapshot the chunk was cut from
    pub source_row: usize,
    /// Position among the chunks of that row
    pub chunk_index: usize,
    pub tokens: usize,
    /// `tokens` minus the token count of the whole source text
    pub tokens_delta: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Token,
    Sentence,
    Recursive,
    Markdown,
}

impl TryFrom<SplitMethod> for Method {
    type Error = ConfigError;

    fn try_from(method: SplitMethod) -> std::result::Result<Self, Self::Error> {
        match method {
            SplitMethod::Token => Ok(Method::Token),
            SplitMethod::Sentence => Ok(Method::Sentence),
            SplitMethod::Recursive => Ok(Method::Recursive),
            SplitMethod::Markdown => Ok(Method::Markdown),
            SplitMethod::Semantic => Err(ConfigError::invalid(
                "text_splitter.split_method",
                "semantic splitting is not supported",
            )),
        }
    }
}

#[derive(Debug, PartialEq)]
struct Section {
    headers: Vec<(usize, String)>,
    content: String,
}

pub struct AdaptiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    min_tokens_per_chunk: usize,
    method: Method,
    split_method: SplitMethod,
    short_chunk_policy: ShortChunkPolicy,
    tokenizer: Arc<dyn Tokenizer>,
}

impl fmt::Debug for AdaptiveChunker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveChunker")
            .field("chunk_size", &self.chunk_size)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("min_tokens_per_chunk", &self.min_tokens_per_chunk)
            .field("split_method", &self.split_method)
            .field("short_chunk_policy", &self.short_chunk_policy)
            .field("tokenizer", &self.tokenizer.name())
            .finish()
    }
}

impl AdaptiveChunker {
    pub fn new(settings: &TextSplitterSettings, tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        let method = Method::try_from(settings.split_method)?;
        if settings.chunk_size == 0 {
            return Err(CorpusError::Config(ConfigError::invalid(
                "text_splitter.chunk_size",
                "must be greater than 0",
            )));
        }
        if settings.chunk_overlap >= settings.chunk_size {
            return Err(CorpusError::Config(ConfigError::invalid(
                "text_splitter.chunk_overlap",
                format!("must be smaller than chunk_size ({})", settings.chunk_size),
            )));
        }

        Ok(Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
            min_tokens_per_chunk: settings.min_tokens_per_chunk,
            method,
            split_method: settings.split_method,
            short_chunk_policy: settings.short_chunk_policy,
            tokenizer,
        })
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        count_tokens(self.tokenizer.as_ref(), text)
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let total_tokens = self.count_tokens(text);
        if total_tokens <= self.chunk_size {
            return vec![text.to_string()];
        }

        let max_tokens = self.tokenizer.model_max_length().max(1);
        let raw = if total_tokens <= max_tokens {
            self.split_with_method(text)
        } else {
            let pieces = total_tokens.div_ceil(max_tokens);
            tracing::debug!(
                "{}",
                DocumentPartitioned {
                    tokens: total_tokens,
                    max_tokens,
                    pieces,
                }
            );
            partition_words(text, pieces)
                .iter()
                .flat_map(|piece| self.split_with_method(piece))
                .collect()
        };

        let (chunks, short_chunks) = self.apply_short_chunk_policy(raw);
        tracing::debug!(
            "{}",
            DocumentChunked {
                method: self.split_method.as_str(),
                tokens: total_tokens,
                chunks: chunks.len(),
                short_chunks,
            }
        );
        chunks
    }

    /// Split the text of snapshot row `source_row`, attaching provenance.
    pub fn split_record(&self, source_row: usize, text: &str) -> Vec<Chunk> {
        let source_tokens = self.count_tokens(text) as i64;
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| {
                let tokens = self.count_tokens(&text);
                Chunk {
                    text,
                    source_row,
                    chunk_index,
                    tokens,
                    tokens_delta: tokens as i64 - source_tokens,
                }
            })
            .collect()
    }

    fn split_with_method(&self, text: &str) -> Vec<String> {
        match self.method {
            Method::Token => {
                let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
                self.merge_splits(&words, " ")
            }
            Method::Sentence => self.merge_splits(&split_sentences(text), " "),
            Method::Recursive => self.split_recursive(text, &RECURSIVE_SEPARATORS),
            Method::Markdown => self.split_markdown(text),
        }
    }

    fn apply_short_chunk_policy(&self, chunks: Vec<String>) -> (Vec<String>, usize) {
        let mut short = 0;
        match self.short_chunk_policy {
            ShortChunkPolicy::Drop => {
                let kept: Vec<String> = chunks
                    .into_iter()
                    .filter(|chunk| {
                        let keep = self.count_tokens(chunk) >= self.min_tokens_per_chunk;
                        if !keep {
                            short += 1;
                        }
                        keep
                    })
                    .collect();
                (kept, short)
            }
            ShortChunkPolicy::MergeWithPrevious => {
                let mut merged: Vec<String> = Vec::new();
                let mut carry: Option<String> = None;
                for chunk in chunks {
                    let chunk = match carry.take() {
                        Some(leading) => format!("{}\n\n{}", leading, chunk),
                        None => chunk,
                    };
                    if self.count_tokens(&chunk) >= self.min_tokens_per_chunk {
                        merged.push(chunk);
                        continue;
                    }
                    short += 1;
                    match merged.last_mut() {
                        Some(previous) => {
                            previous.push_str("\n\n");
                            previous.push_str(&chunk);
                        }
                        None => carry = Some(chunk),
                    }
                }
                // everything was short: keep it as one chunk rather than lose it
                if let Some(rest) = carry {
                    merged.push(rest);
                }
                (merged, short)
            }
        }
    }

    /// Greedily join `splits` into chunks of at most `chunk_size` tokens,
    /// starting each new chunk with up to `chunk_overlap` tokens of the
    /// previous one. A single split larger than the budget becomes its own
    /// chunk.
    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let separator_len = self.count_tokens(separator);
        let lengths: Vec<usize> = splits.iter().map(|s| self.count_tokens(s)).collect();

        let mut docs = Vec::new();
        let mut window: VecDeque<usize> = VecDeque::new();
        let mut total = 0usize;

        for (index, &len) in lengths.iter().enumerate() {
            let joining = if window.is_empty() { 0 } else { separator_len };
            if total + len + joining > self.chunk_size && !window.is_empty() {
                if let Some(doc) = join_window(splits, &window, separator) {
                    docs.push(doc);
                }
                loop {
                    let joining = if window.is_empty() { 0 } else { separator_len };
                    let must_shrink = total > self.chunk_overlap
                        || (total + len + joining > self.chunk_size && total > 0);
                    if !must_shrink {
                        break;
                    }
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    let dropped_separator = if window.is_empty() { 0 } else { separator_len };
                    total = total.saturating_sub(lengths[first] + dropped_separator);
                }
            }
            window.push_back(index);
            total += len + if window.len() > 1 { separator_len } else { 0 };
        }

        if let Some(doc) = join_window(splits, &window, separator) {
            docs.push(doc);
        }
        docs
    }

    /// Split on the first separator present in `text`, recursing into pieces
    /// that are still too long with the remaining separators. Separators stay
    /// attached to the start of the piece that follows them.
    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut remaining: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = candidate;
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in split_keep_separator(text, separator) {
            if self.count_tokens(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge_splits(&fitting, ""));
                fitting.clear();
            }
            if remaining.is_empty() {
                let piece = piece.trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(&piece, remaining));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge_splits(&fitting, ""));
        }
        chunks
    }

    /// One chunk per heading section with the heading trail re-attached;
    /// sections over budget are split recursively, each piece keeping the
    /// trail. Sections are never merged with each other.
    fn split_markdown(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        for section in markdown_sections(text) {
            let prefix = header_prefix(&section.headers);
            let content = section.content.trim();
            let with_header = format!("{}{}", prefix, content);

            if self.count_tokens(&with_header) > self.chunk_size {
                for piece in self.split_recursive(content, &RECURSIVE_SEPARATORS) {
                    chunks.push(format!("{}{}", prefix, piece.trim()));
                }
            } else {
                chunks.push(with_header);
            }
        }
        chunks
    }
}

fn join_window(splits: &[String], window: &VecDeque<usize>, separator: &str) -> Option<String> {
    let joined = window
        .iter()
        .map(|&i| splits[i].as_str())
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn split_keep_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut pieces = text.split(separator);
    let mut out = Vec::new();
    if let Some(first) = pieces.next() {
        if !first.is_empty() {
            out.push(first.to_string());
        }
    }
    out.extend(pieces.map(|piece| format!("{}{}", separator, piece)));
    out
}

/// `pieces` runs of consecutive words, each with an even share.
fn partition_words(text: &str, pieces: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    let per_piece = words.len().div_ceil(pieces.max(1));
    words.chunks(per_piece).map(|run| run.join(" ")).collect()
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let boundary = match c {
            '。' | '！' | '？' | '；' => true,
            '.' | '!' | '?' => chars.peek().map_or(true, |next| next.is_whitespace()),
            '\n' => chars.peek() == Some(&'\n'),
            _ => false,
        };
        if boundary {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Heading level of an H1-H4 line, if it is one.
fn header_level(line: &str) -> Option<usize> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if level == 0 || level > MAX_HEADER_LEVEL {
        return None;
    }
    match line[level..].chars().next() {
        None | Some(' ') => Some(level),
        Some(_) => None,
    }
}

fn header_prefix(headers: &[(usize, String)]) -> String {
    if headers.is_empty() {
        return String::new();
    }
    let trail: Vec<String> = headers
        .iter()
        .map(|(level, title)| format!("{} {}", "#".repeat(*level), title))
        .collect();
    format!("{}\n\n", trail.join("\n"))
}

/// Group paragraphs under the heading trail in effect for them. Heading lines
/// themselves are not content, and headings inside fenced code are ignored.
fn markdown_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut trail: Vec<(usize, String)> = Vec::new();
    let mut paragraph: Vec<&str> = Vec::new();
    let mut fence: Option<&'static str> = None;

    fn flush(sections: &mut Vec<Section>, trail: &[(usize, String)], paragraph: &mut Vec<&str>) {
        if paragraph.is_empty() {
            return;
        }
        let content = paragraph.join("\n");
        paragraph.clear();
        match sections.last_mut() {
            Some(last) if last.headers == trail => {
                last.content.push_str("\n\n");
                last.content.push_str(&content);
            }
            _ => sections.push(Section {
                headers: trail.to_vec(),
                content,
            }),
        }
    }

    for line in text.lines() {
        let stripped = line.trim();

        if let Some(open) = fence {
            paragraph.push(line.trim_end());
            if stripped.starts_with(open) {
                fence = None;
            }
            continue;
        }
        if stripped.starts_with("```") && stripped.matches("```").count() == 1 {
            fence = Some("```");
            paragraph.push(line.trim_end());
            continue;
        }
        if stripped.starts_with("~~~") {
            fence = Some("~~~");
            paragraph.push(line.trim_end());
            continue;
        }

        if let Some(level) = header_level(stripped) {
            flush(&mut sections, &trail, &mut paragraph);
            while trail.last().is_some_and(|(top, _)| *top >= level) {
                trail.pop();
            }
            trail.push((level, stripped[level..].trim().to_string()));
        } else if stripped.is_empty() {
            flush(&mut sections, &trail, &mut paragraph);
        } else {
            paragraph.push(stripped);
        }
    }
    flush(&mut sections, &trail, &mut paragraph);
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::WhitespaceTokenizer;
    use proptest::prelude::*;

    fn settings(
        method: SplitMethod,
        chunk_size: usize,
        chunk_overlap: usize,
        min_tokens: usize,
    ) -> TextSplitterSettings {
        TextSplitterSettings {
            chunk_size,
            chunk_overlap,
            split_method: method,
            min_tokens_per_chunk: min_tokens,
            ..TextSplitterSettings::default()
        }
    }

    fn chunker(settings: &TextSplitterSettings, max_length: usize) -> AdaptiveChunker {
        AdaptiveChunker::new(settings, Arc::new(WhitespaceTokenizer::new(max_length))).unwrap()
    }

    fn words(count: usize) -> String {
        (0..count)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_split_decisions() {
        struct TestCase {
            name: &'static str,
            method: SplitMethod,
            text: String,
            expected: Vec<String>,
        }

        let test_cases = vec![
            TestCase {
                name: "empty text has no chunks",
                method: SplitMethod::Token,
                text: String::new(),
                expected: vec![],
            },
            TestCase {
                name: "whitespace text has no chunks",
                method: SplitMethod::Recursive,
                text: "  \n\t ".to_string(),
                expected: vec![],
            },
            TestCase {
                name: "short text is returned whole even below the minimum",
                method: SplitMethod::Token,
                text: "two words".to_string(),
                expected: vec!["two words".to_string()],
            },
            TestCase {
                name: "markdown heading with a short paragraph",
                method: SplitMethod::Markdown,
                text: "# H1\n\nshort para".to_string(),
                expected: vec!["# H1\n\nshort para".to_string()],
            },
        ];

        for tc in test_cases {
            let chunker = chunker(&settings(tc.method, 10, 2, 3), 1000);
            assert_eq!(chunker.split(&tc.text), tc.expected, "chunks mismatch for '{}'", tc.name);
        }
    }

    #[test]
    fn test_token_windows_with_overlap() {
        let chunker = chunker(&settings(SplitMethod::Token, 4, 1, 1), 1000);
        let chunks = chunker.split("a b c d e f g h i j");
        assert_eq!(chunks, vec!["a b c d", "d e f g", "g h i j"]);
    }

    #[test]
    fn test_sentence_boundaries() {
        assert_eq!(
            split_sentences("First one. Second one! Third? 第四句。第五句\n\nNew para"),
            vec!["First one.", "Second one!", "Third?", "第四句。", "第五句", "New para"]
        );
        assert_eq!(split_sentences("v1.2 stays whole."), vec!["v1.2 stays whole."]);

        let chunker = chunker(&settings(SplitMethod::Sentence, 5, 0, 1), 1000);
        let chunks = chunker.split("One two three. Four five six. Seven eight.");
        assert_eq!(chunks, vec!["One two three.", "Four five six. Seven eight."]);
    }

    #[test]
    fn test_recursive_prefers_paragraphs() {
        let text = format!("{}\n\n{}\n\n{}", words(4), words(4), words(4));
        let chunker = chunker(&settings(SplitMethod::Recursive, 9, 0, 1), 1000);
        let chunks = chunker.split(&text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{}\n\n{}", words(4), words(4)));
        assert_eq!(chunks[1], words(4));
    }

    #[test]
    fn test_markdown_sections_follow_heading_trail() {
        let text = "intro line\n\n# Title\n\nalpha beta\n\n## Part\n\ngamma\n\n```\n# not a heading\n```\n\n# Next\n\ndelta";
        let sections = markdown_sections(text);
        assert_eq!(sections.len(), 4);
        assert!(sections[0].headers.is_empty());
        assert_eq!(sections[1].content, "alpha beta");
        assert_eq!(
            sections[2].headers,
            vec![(1, "Title".to_string()), (2, "Part".to_string())]
        );
        assert_eq!(sections[2].content, "gamma\n\n```\n# not a heading\n```");
        assert_eq!(sections[3].headers, vec![(1, "Next".to_string())]);
    }

    #[test]
    fn test_markdown_long_section_keeps_prefix() {
        let text = format!(
            "# Guide\n\n## Setup\n\n{}\n\n{}\n\n# Other\n\n{}",
            words(6),
            words(6),
            words(5)
        );
        let chunker = chunker(&settings(SplitMethod::Markdown, 10, 0, 1), 1000);
        let chunks = chunker.split(&text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], format!("# Guide\n## Setup\n\n{}", words(6)));
        assert_eq!(chunks[1], format!("# Guide\n## Setup\n\n{}", words(6)));
        assert_eq!(chunks[2], format!("# Other\n\n{}", words(5)));
    }

    #[test]
    fn test_short_chunk_policies() {
        let text = format!("{}\n\nshort", words(8));

        let dropping = chunker(&settings(SplitMethod::Recursive, 8, 0, 3), 1000);
        assert_eq!(dropping.split(&text), vec![words(8)]);

        let mut merge = settings(SplitMethod::Recursive, 8, 0, 3);
        merge.short_chunk_policy = ShortChunkPolicy::MergeWithPrevious;
        let merging = chunker(&merge, 1000);
        assert_eq!(merging.split(&text), vec![format!("{}\n\nshort", words(8))]);
    }

    #[test]
    fn test_long_documents_are_partitioned_first() {
        // 30 words, tokenizer limit 10: three pieces of 10 words, each re-chunked
        let chunker = chunker(&settings(SplitMethod::Token, 6, 0, 1), 10);
        let chunks = chunker.split(&words(30));
        assert_eq!(
            chunks,
            vec![
                words(30).split(' ').take(6).collect::<Vec<_>>().join(" "),
                words(30).split(' ').skip(6).take(4).collect::<Vec<_>>().join(" "),
                words(30).split(' ').skip(10).take(6).collect::<Vec<_>>().join(" "),
                words(30).split(' ').skip(16).take(4).collect::<Vec<_>>().join(" "),
                words(30).split(' ').skip(20).take(6).collect::<Vec<_>>().join(" "),
                words(30).split(' ').skip(26).take(4).collect::<Vec<_>>().join(" "),
            ]
        );
    }

    #[test]
    fn test_split_record_provenance() {
        let chunker = chunker(&settings(SplitMethod::Token, 4, 0, 1), 1000);
        let chunks = chunker.split_record(7, &words(10));

        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.source_row, 7);
            assert_eq!(chunk.chunk_index, i);
        }
        assert_eq!(chunks[0].tokens, 4);
        assert_eq!(chunks[0].tokens_delta, -6);
        assert_eq!(chunks[2].tokens, 2);
        assert_eq!(chunks[2].tokens_delta, -8);
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let tokenizer: Arc<dyn Tokenizer> = Arc::new(WhitespaceTokenizer::new(100));
        for (name, settings) in [
            ("semantic", settings(SplitMethod::Semantic, 10, 2, 1)),
            ("zero chunk size", settings(SplitMethod::Token, 0, 0, 0)),
            ("overlap too large", settings(SplitMethod::Token, 10, 10, 1)),
        ] {
            assert!(
                matches!(
                    AdaptiveChunker::new(&settings, tokenizer.clone()),
                    Err(CorpusError::Config(_))
                ),
                "'{}' should be rejected",
                name
            );
        }
    }

    fn word_text(max_words: usize) -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z]{1,8}", 1..=max_words).prop_map(|w| w.join(" "))
    }

    fn any_method() -> impl Strategy<Value = SplitMethod> {
        prop_oneof![
            Just(SplitMethod::Token),
            Just(SplitMethod::Sentence),
            Just(SplitMethod::Recursive),
            Just(SplitMethod::Markdown),
        ]
    }

    proptest! {
        #[test]
        fn prop_short_text_is_one_chunk(text in word_text(32), method in any_method()) {
            let chunker = chunker(&settings(method, 32, 8, 5), 1000);
            prop_assert_eq!(chunker.split(&text), vec![text.clone()]);
        }

        #[test]
        fn prop_chunks_meet_minimum(
            text in word_text(300),
            method in any_method(),
            max_length in 20usize..400,
        ) {
            let chunker = chunker(&settings(method, 16, 4, 3), max_length);
            let total = chunker.count_tokens(&text);
            for chunk in chunker.split(&text) {
                prop_assert!(!chunk.is_empty());
                if total > 16 {
                    prop_assert!(chunker.count_tokens(&chunk) >= 3);
                }
            }
        }

        #[test]
        fn prop_token_windows_respect_budget(text in word_text(300)) {
            let chunker = chunker(&settings(SplitMethod::Token, 16, 4, 1), 1000);
            for chunk in chunker.split(&text) {
                prop_assert!(chunker.count_tokens(&chunk) <= 16);
            }
        }
    }
}
