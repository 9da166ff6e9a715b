// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod loader;
mod registry;
mod runtime;

pub mod consts;

pub use loader::{
    deep_merge, load_and_validate_config, load_config, validate_config, CleaningSettings,
    ConfigMap, LlmCleanerSettings, LlmSettings, ProcessingSettings, RegistrySettings,
    RetrySettings, Settings, StorageSettings, TextSplitterSettings,
};
pub use registry::{
    Constructor, EntryMetadata, NamespaceResolver, Registration, Registry, RegistryKind,
    RegistryStats,
};
pub use runtime::Registries;
