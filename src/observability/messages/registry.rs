// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for component registries.

use crate::errors::RegistryError;
use std::fmt::{Display, Formatter};

/// A constructor was registered.
///
/// # Log Level
/// `debug!` - Happens once per built-in at startup
pub struct RegistryEntryRegistered<'a> {
    pub registry: &'a str,
    pub name: &'a str,
    pub source_module: &'a str,
}

impl Display for RegistryEntryRegistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Registered '{}' in '{}' registry (from {})",
            self.name, self.registry, self.source_module
        )
    }
}

/// A name was registered a second time and replaces the earlier entry.
///
/// # Log Level
/// `warn!` - Usually a naming clash between two modules
pub struct RegistryEntryOverwritten<'a> {
    pub registry: &'a str,
    pub name: &'a str,
}

impl Display for RegistryEntryOverwritten<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Overwriting existing entry '{}' in '{}' registry",
            self.name, self.registry
        )
    }
}

/// A name missing from the table was found in a fallback namespace.
///
/// # Log Level
/// `info!`
pub struct RegistryLazyLoaded<'a> {
    pub registry: &'a str,
    pub name: &'a str,
    pub namespace: &'a str,
}

impl Display for RegistryLazyLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Lazily loaded '{}' into '{}' registry from namespace '{}'",
            self.name, self.registry, self.namespace
        )
    }
}

/// Lookup failed everywhere.
///
/// # Log Level
/// `error!` - The caller cannot build the component it asked for
pub struct RegistryLookupFailed<'a> {
    pub error: &'a RegistryError,
}

impl Display for RegistryLookupFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Registry lookup failed: {}", self.error)
    }
}

/// Expired cache entries were dropped.
///
/// # Log Level
/// `debug!`
pub struct RegistryCacheEvicted<'a> {
    pub registry: &'a str,
    pub count: usize,
}

impl Display for RegistryCacheEvicted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Evicted {} expired cache entries from '{}' registry",
            self.count, self.registry
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_failed_includes_registry_error() {
        let error = RegistryError::NotFound {
            name: "remove_html".into(),
            registry: "micro_op".into(),
        };
        let msg = RegistryLookupFailed { error: &error };
        assert_eq!(
            msg.to_string(),
            "Registry lookup failed: No object named 'remove_html' found in 'micro_op' registry"
        );
    }
}
