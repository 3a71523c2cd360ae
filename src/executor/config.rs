// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Execution configuration
//!

use crate::core::{Error, Result};

/// Options shared by every operator of one execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Batch size used when an index declares none (zero)
    /// Default: 500
    pub default_batch_size: usize,

    /// Whether operators record timers and counters
    /// Default: false
    pub statistics_enabled: bool,

    /// Never write back to batch caches, only read
    /// Default: false
    pub batch_cache_read_only: bool,

    /// Lower bound for per-batch hash table capacity
    /// Default: 16
    pub hash_table_min_capacity: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_batch_size: 500,
            statistics_enabled: false,
            batch_cache_read_only: false,
            hash_table_min_capacity: 16,
        }
    }
}

impl ExecutionConfig {
    /// Creates a new ExecutionConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fallback batch size
    pub fn with_default_batch_size(mut self, size: usize) -> Self {
        self.default_batch_size = size;
        self
    }

    /// Enables or disables statistics collection
    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.statistics_enabled = enabled;
        self
    }

    /// Enables or disables the global batch cache read-only mode
    pub fn with_batch_cache_read_only(mut self, read_only: bool) -> Self {
        self.batch_cache_read_only = read_only;
        self
    }

    /// Sets the minimum hash table capacity
    pub fn with_hash_table_min_capacity(mut self, capacity: usize) -> Self {
        self.hash_table_min_capacity = capacity;
        self
    }

    /// Parse an option string such as `batch_size=100&statistics=true`.
    ///
    /// Unknown keys and unparsable values are errors.
    pub fn from_options(options: &str) -> Result<Self> {
        let mut config = Self::default();

        for param in options.split('&').filter(|p| !p.trim().is_empty()) {
            let mut parts = param.splitn(2, '=');
            let key = parts.next().unwrap_or("").trim();
            let value = parts.next().unwrap_or("").trim();

            match key {
                // Fallback batch size: batch_size=500
                "batch_size" | "default_batch_size" => {
                    let size = parse_usize(key, value)?;
                    if size == 0 {
                        return Err(Error::invalid_option(key, "must be positive"));
                    }
                    config.default_batch_size = size;
                }
                // Statistics collection: statistics=true
                "statistics" | "statistics_enabled" => {
                    config.statistics_enabled = parse_bool(key, value)?;
                }
                // Batch cache read-only mode: cache_read_only=true
                "cache_read_only" | "batch_cache_read_only" => {
                    config.batch_cache_read_only = parse_bool(key, value)?;
                }
                // Minimum hash table capacity: hash_capacity=64
                "hash_capacity" | "hash_table_min_capacity" => {
                    config.hash_table_min_capacity = parse_usize(key, value)?;
                }
                _ => return Err(Error::invalid_option(key, "unknown option")),
            }
        }

        Ok(config)
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize> {
    value
        .parse::<usize>()
        .map_err(|_| Error::invalid_option(key, format!("expected an integer, got '{}'", value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(Error::invalid_option(
            key,
            format!("expected a boolean, got '{}'", value),
        )),
    }
}
