// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Flattening a directory of text files into one JSON-Lines corpus.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::consts::{RAW_CONTENT_KEY, RAW_CORPUS_FILE_NAME, RAW_CORPUS_INDEX_FILE_NAME};
use crate::config::ProcessingSettings;
use crate::errors::{CorpusError, Result};
use crate::observability::messages::framework::{RawCorpusFileSkipped, RawCorpusPreprocessed};
use crate::text::{count_tokens, Tokenizer};

/// Outcome of [`preprocess`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawCorpusSummary {
    pub source_dir: PathBuf,
    pub corpus_file: PathBuf,
    pub index_file: PathBuf,
    pub files: usize,
    pub skipped: Vec<PathBuf>,
    pub tokens: u64,
}

/// Every file under `dir` (recursively, in path order) whose name ends with
/// a supported extension and whose path contains no exclude pattern.
pub fn discover(dir: &Path, settings: &ProcessingSettings) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk(dir, &mut files)?;
    files.retain(|path| {
        let full = path.to_string_lossy();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        !settings
            .exclude_patterns
            .iter()
            .any(|pattern| full.contains(pattern.as_str()))
            && settings
                .supported_extensions
                .iter()
                .any(|ext| name.ends_with(ext.as_str()))
    });
    Ok(files)
}

fn walk(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .map_err(|e| CorpusError::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| CorpusError::io(dir, e))?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            walk(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Write every discovered file of `dir` as a row
/// `{file_path, raw_content, raw_content_tokens, processed_at}` of
/// `preprocess_raw_corpus.jsonl` in `output_dir`, with a `path\ttokens`
/// index next to it.
///
/// Files that are not valid UTF-8 (or cannot be read) are skipped and
/// listed in the summary. A directory with no matching file is an error.
pub fn preprocess(
    dir: &Path,
    output_dir: &Path,
    settings: &ProcessingSettings,
    tokenizer: &dyn Tokenizer,
) -> Result<RawCorpusSummary> {
    let files = discover(dir, settings)?;
    if files.is_empty() {
        return Err(CorpusError::Data(format!(
            "no files with extensions {:?} found under {}",
            settings.supported_extensions,
            dir.display()
        )));
    }

    let corpus_file = output_dir.join(RAW_CORPUS_FILE_NAME);
    let index_file = output_dir.join(RAW_CORPUS_INDEX_FILE_NAME);
    let open = |path: &Path| {
        File::create(path)
            .map(BufWriter::new)
            .map_err(|e| CorpusError::io(path, e))
    };
    let mut corpus = open(&corpus_file)?;
    let mut index = open(&index_file)?;

    let mut written = 0;
    let mut skipped = Vec::new();
    let mut tokens_total = 0u64;
    for path in files {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(
                    "{}",
                    RawCorpusFileSkipped {
                        path: &path,
                        reason: &reason,
                    }
                );
                skipped.push(path);
                continue;
            }
        };
        let tokens = count_tokens(tokenizer, &content);
        let record = json!({
            "file_path": path.to_string_lossy(),
            RAW_CONTENT_KEY: content,
            format!("{}_tokens", RAW_CONTENT_KEY): tokens,
            "processed_at": Utc::now().to_rfc3339(),
        });
        writeln!(corpus, "{}", record).map_err(|e| CorpusError::io(&corpus_file, e))?;
        writeln!(index, "{}\t{}", path.display(), tokens)
            .map_err(|e| CorpusError::io(&index_file, e))?;
        written += 1;
        tokens_total += tokens as u64;
    }
    corpus.flush().map_err(|e| CorpusError::io(&corpus_file, e))?;
    index.flush().map_err(|e| CorpusError::io(&index_file, e))?;

    tracing::info!(
        "{}",
        RawCorpusPreprocessed {
            files: written,
            skipped: skipped.len(),
            output: &corpus_file,
        }
    );
    Ok(RawCorpusSummary {
        source_dir: dir.to_path_buf(),
        corpus_file,
        index_file,
        files: written,
        skipped,
        tokens: tokens_total,
    })
}
