// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Parameter Calculator
//!
//! Turns operator configuration plus the memory available to the instance
//! into the flat set of server parameters to apply.
//!
//! Raw options are validated once, at the boundary, into [`ConfigOptions`]:
//! keys are partitioned by category prefix (`memory_`, `request_`, ...) and
//! the prefix is stripped to obtain the parameter name. The calculator then
//! derives `shared_buffers` and `effective_cache_size` from the memory
//! budget.
//!
//! Memory units: `shared_buffers` overrides are counted in 8kB blocks;
//! derived values use 128 blocks per MB, MB being 10⁶ bytes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const SHARED_BUFFERS: &str = "shared_buffers";
pub const EFFECTIVE_CACHE_SIZE: &str = "effective_cache_size";

const PROFILE_KEY: &str = "profile";
const SHARED_BUFFERS_OPTION: &str = "memory_shared_buffers";

const BYTES_PER_MB: u64 = 1_000_000;
const BLOCKS_PER_MB: u64 = 128;
const BLOCK_SIZE_BYTES: u64 = 8 * 1_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("configuration option \"profile\" is required")]
    MissingProfile,

    #[error("unknown profile {0:?}, expected \"production\" or \"testing\"")]
    InvalidProfile(String),

    #[error("memory_shared_buffers must be a non-negative integer number of blocks, got {0}")]
    InvalidSharedBuffers(ParameterValue),

    #[error("Shared Buffers config option should be at most 40% of the available memory, which is {max_mb}MB ({max_blocks} blocks), got {requested} blocks")]
    SharedBuffersTooLarge {
        requested: u64,
        max_blocks: u64,
        max_mb: u64,
    },
}

/// A typed configuration or server parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(true) => f.write_str("on"),
            ParameterValue::Bool(false) => f.write_str("off"),
            ParameterValue::Integer(value) => write!(f, "{value}"),
            ParameterValue::Float(value) => write!(f, "{value}"),
            ParameterValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Float(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Memory-derived tuning enabled.
    Production,
    /// Memory-derived tuning disabled.
    Testing,
}

impl Profile {
    fn parse(value: &ParameterValue) -> Result<Self, ParameterError> {
        match value {
            ParameterValue::Text(text) if text == "production" => Ok(Profile::Production),
            ParameterValue::Text(text) if text == "testing" => Ok(Profile::Testing),
            other => Err(ParameterError::InvalidProfile(other.to_string())),
        }
    }
}

/// Option categories. An option belongs to a category when its first
/// `_`-separated segment is the category prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionCategory {
    Connection,
    Cpu,
    Durability,
    Instance,
    Logging,
    Memory,
    Optimizer,
    Request,
    Response,
    Session,
    Storage,
    Vacuum,
}

impl OptionCategory {
    pub const ALL: [OptionCategory; 12] = [
        OptionCategory::Connection,
        OptionCategory::Cpu,
        OptionCategory::Durability,
        OptionCategory::Instance,
        OptionCategory::Logging,
        OptionCategory::Memory,
        OptionCategory::Optimizer,
        OptionCategory::Request,
        OptionCategory::Response,
        OptionCategory::Session,
        OptionCategory::Storage,
        OptionCategory::Vacuum,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            OptionCategory::Connection => "connection",
            OptionCategory::Cpu => "cpu",
            OptionCategory::Durability => "durability",
            OptionCategory::Instance => "instance",
            OptionCategory::Logging => "logging",
            OptionCategory::Memory => "memory",
            OptionCategory::Optimizer => "optimizer",
            OptionCategory::Request => "request",
            OptionCategory::Response => "response",
            OptionCategory::Session => "session",
            OptionCategory::Storage => "storage",
            OptionCategory::Vacuum => "vacuum",
        }
    }

    /// Split `key` into its category and canonical parameter name.
    pub fn classify(key: &str) -> Option<(OptionCategory, String)> {
        let (prefix, rest) = key.split_once('_')?;
        let category = Self::ALL.into_iter().find(|c| c.prefix() == prefix)?;
        Some((category, canonical_parameter_name(rest)))
    }
}

fn canonical_parameter_name(name: &str) -> String {
    match name {
        "date_style" => "DateStyle".to_string(),
        "time_zone" => "TimeZone".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigParameter {
    pub category: OptionCategory,
    pub name: String,
    pub value: ParameterValue,
}

/// Validated operator configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<String, ParameterValue>")]
pub struct ConfigOptions {
    pub profile: Profile,
    /// Explicit `shared_buffers`, in 8kB blocks.
    pub shared_buffers: Option<u64>,
    parameters: Vec<ConfigParameter>,
}

impl ConfigOptions {
    pub fn from_raw<I, K>(raw: I) -> Result<Self, ParameterError>
    where
        I: IntoIterator<Item = (K, ParameterValue)>,
        K: Into<String>,
    {
        let mut profile = None;
        let mut shared_buffers = None;
        let mut parameters = Vec::new();

        for (key, value) in raw {
            let key = key.into();
            if key == PROFILE_KEY {
                profile = Some(Profile::parse(&value)?);
            } else if key == SHARED_BUFFERS_OPTION {
                shared_buffers = Some(parse_blocks(value)?);
            } else if let Some((category, name)) = OptionCategory::classify(&key) {
                parameters.push(ConfigParameter { category, name, value });
            }
        }

        Ok(Self {
            profile: profile.ok_or(ParameterError::MissingProfile)?,
            shared_buffers,
            parameters,
        })
    }

    pub fn parameters(&self) -> &[ConfigParameter] {
        &self.parameters
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_shared_buffers(mut self, blocks: Option<u64>) -> Self {
        self.shared_buffers = blocks;
        self
    }
}

impl TryFrom<BTreeMap<String, ParameterValue>> for ConfigOptions {
    type Error = ParameterError;

    fn try_from(raw: BTreeMap<String, ParameterValue>) -> Result<Self, Self::Error> {
        Self::from_raw(raw)
    }
}

fn parse_blocks(value: ParameterValue) -> Result<u64, ParameterError> {
    match value {
        ParameterValue::Integer(blocks) if blocks >= 0 => Ok(blocks as u64),
        other => Err(ParameterError::InvalidSharedBuffers(other)),
    }
}

/// Server parameters ready to be applied, keyed by canonical name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostgreSqlParameters(BTreeMap<String, ParameterValue>);

impl PostgreSqlParameters {
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, ParameterValue> {
        self.0
    }

    fn insert(&mut self, name: impl Into<String>, value: ParameterValue) {
        self.0.insert(name.into(), value);
    }
}

/// Largest accepted `shared_buffers` override for a budget: 40% of it,
/// truncated to whole MB, in 8kB blocks. Returns `(max_mb, max_blocks)`.
pub fn shared_buffers_limit(memory_budget: u64) -> (u64, u64) {
    let max_mb = scale(memory_budget, 4, 10 * BYTES_PER_MB);
    let max_blocks = scale(max_mb, 1_000, 8);
    (max_mb, max_blocks)
}

/// `value * numerator / denominator` computed in `u128`, saturating if the
/// result does not fit.
fn scale(value: u64, numerator: u64, denominator: u64) -> u64 {
    let scaled = u128::from(value) * u128::from(numerator) / u128::from(denominator);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

fn blocks_value(blocks: u64) -> ParameterValue {
    ParameterValue::Integer(i64::try_from(blocks).unwrap_or(i64::MAX))
}

/// Compute the server parameters.
///
/// `max_memory`, when set and non-zero, caps `available_memory`. A
/// `shared_buffers` override above 40% of the budget is rejected for every
/// profile; exactly 40% is accepted.
pub fn build_postgresql_parameters(
    options: &ConfigOptions,
    available_memory: u64,
    max_memory: Option<u64>,
) -> Result<PostgreSqlParameters, ParameterError> {
    let budget = match max_memory {
        Some(limit) if limit > 0 => available_memory.min(limit),
        _ => available_memory,
    };
    tracing::debug!(profile = ?options.profile, budget, "building PostgreSQL parameters");

    let mut parameters = PostgreSqlParameters::default();
    for parameter in &options.parameters {
        parameters.insert(parameter.name.clone(), parameter.value.clone());
    }

    let (max_mb, max_blocks) = shared_buffers_limit(budget);
    if let Some(requested) = options.shared_buffers {
        if requested > max_blocks {
            return Err(ParameterError::SharedBuffersTooLarge {
                requested,
                max_blocks,
                max_mb,
            });
        }
        parameters.insert(SHARED_BUFFERS, blocks_value(requested));
    }

    if options.profile == Profile::Testing {
        return Ok(parameters);
    }

    let shared_buffers_bytes = match options.shared_buffers {
        Some(blocks) => scale(blocks, BLOCK_SIZE_BYTES, 1),
        None => {
            let bytes = budget / 4;
            parameters.insert(SHARED_BUFFERS, blocks_value(scale(bytes, BLOCKS_PER_MB, BYTES_PER_MB)));
            bytes
        }
    };

    let cache_bytes = budget.saturating_sub(shared_buffers_bytes);
    let cache_blocks = scale(cache_bytes / BYTES_PER_MB, BLOCKS_PER_MB, 1);
    parameters.insert(EFFECTIVE_CACHE_SIZE, blocks_value(cache_blocks));

    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn production() -> ConfigOptions {
        ConfigOptions::from_raw([("profile", ParameterValue::from("production"))]).unwrap()
    }

    #[test]
    fn test_classify_strips_prefix() {
        assert_eq!(
            OptionCategory::classify("memory_work_mem"),
            Some((OptionCategory::Memory, "work_mem".to_string()))
        );
        assert_eq!(
            OptionCategory::classify("request_time_zone"),
            Some((OptionCategory::Request, "TimeZone".to_string()))
        );
        assert_eq!(OptionCategory::classify("other_option"), None);
        assert_eq!(OptionCategory::classify("profile"), None);
    }

    #[test]
    fn test_limit_at_one_gigabyte() {
        assert_eq!(shared_buffers_limit(1_000_000_000), (400, 50_000));
    }

    #[test]
    fn test_zero_cap_is_ignored() {
        let parameters = build_postgresql_parameters(&production(), 1_000_000_000, Some(0)).unwrap();
        assert_eq!(parameters.get(SHARED_BUFFERS), Some(&ParameterValue::Integer(250 * 128)));
    }

    #[test]
    fn test_zero_memory_yields_zero_blocks() {
        let parameters = build_postgresql_parameters(&production(), 0, None).unwrap();
        assert_eq!(parameters.get(SHARED_BUFFERS), Some(&ParameterValue::Integer(0)));
        assert_eq!(parameters.get(EFFECTIVE_CACHE_SIZE), Some(&ParameterValue::Integer(0)));
    }

    #[test]
    fn test_limit_at_maximum_budget() {
        let (max_mb, max_blocks) = shared_buffers_limit(u64::MAX);
        assert_eq!(max_mb, 7_378_697_629_483);
        assert_eq!(max_blocks, 922_337_203_685_375);
    }

    #[test]
    fn test_missing_profile() {
        let result = ConfigOptions::from_raw([("memory_work_mem", ParameterValue::Integer(4))]);
        assert_eq!(result, Err(ParameterError::MissingProfile));
    }

    #[test]
    fn test_invalid_shared_buffers() {
        let result = ConfigOptions::from_raw([
            ("profile", ParameterValue::from("production")),
            ("memory_shared_buffers", ParameterValue::from("lots")),
        ]);
        assert!(matches!(result, Err(ParameterError::InvalidSharedBuffers(_))));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(ParameterValue::Bool(true).to_string(), "on");
        assert_eq!(ParameterValue::Float(10.5).to_string(), "10.5");
        assert_eq!(ParameterValue::from("ISO, DMY").to_string(), "ISO, DMY");
    }
}
