// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default token budget per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 512;
/// Default token overlap between neighbouring chunks
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// Chunks with fewer tokens than this are dropped by default
pub const DEFAULT_MIN_TOKENS_PER_CHUNK: usize = 20;
/// Sequence length assumed when the tokenizer does not declare one
pub const DEFAULT_MODEL_MAX_LENGTH: usize = 8192;

/// Registry cache entry lifetime (one hour)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
/// Version stamped on registry entries that do not declare one
pub const DEFAULT_COMPONENT_VERSION: &str = "1.0.0";

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY_SECS: f64 = 1.0;
pub const DEFAULT_MAX_DELAY_SECS: f64 = 60.0;
pub const DEFAULT_EXPONENTIAL_BASE: f64 = 2.0;
/// Jitter spread applied to each backoff delay (±25%)
pub const DEFAULT_JITTER_RATIO: f64 = 0.25;

/// Fixed timeout for one LLM completion request (30 minutes)
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 1800;
pub const DEFAULT_LLM_TEMPERATURE: f64 = 0.7;
pub const MAX_LLM_TEMPERATURE: f64 = 2.0;

/// File name prefix of every stage snapshot
pub const DEFAULT_CACHE_PREFIX: &str = "corpusmill_cache_step";
/// Output directory that receives a timestamped run subdirectory
pub const DEFAULT_OUTPUT_DIR: &str = "./output";
/// Layout of the timestamped run subdirectory
pub const RUN_DIR_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

pub const RAW_CORPUS_FILE_NAME: &str = "preprocess_raw_corpus.jsonl";
pub const RAW_CORPUS_INDEX_FILE_NAME: &str = "preprocess_raw_corpus_files_list.tsv";
/// Column holding raw document text after raw-corpus preprocessing
pub const RAW_CONTENT_KEY: &str = "raw_content";

/// Worker count used when none is configured (number of CPU cores, or 4)
pub fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
