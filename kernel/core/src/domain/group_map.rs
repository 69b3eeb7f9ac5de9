// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Group Map Parser
//!
//! Parses the `external-group=internal-role,...` string that maps LDAP
//! groups onto PostgreSQL roles. Parsing is all-or-nothing: one malformed
//! entry rejects the whole map.

use thiserror::Error;

use crate::domain::access_group::is_protected_role;

const ENTRY_SEPARATOR: char = ',';
const PAIR_SEPARATOR: char = '=';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupMapError {
    #[error("the group-map must contain value pairs split by commas, got entry {entry:?}")]
    Malformed { entry: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupMapEntry {
    /// Group name in the external identity provider.
    pub external: String,
    /// PostgreSQL role its members are granted.
    pub internal: String,
}

impl GroupMapEntry {
    pub fn new(external: impl Into<String>, internal: impl Into<String>) -> Self {
        Self {
            external: external.into(),
            internal: internal.into(),
        }
    }
}

impl From<GroupMapEntry> for (String, String) {
    fn from(entry: GroupMapEntry) -> Self {
        (entry.external, entry.internal)
    }
}

/// Split a raw group map into entries without applying any role policy.
pub fn parse_group_map(raw: &str) -> Result<Vec<GroupMapEntry>, GroupMapError> {
    raw.split(ENTRY_SEPARATOR)
        .map(|mapping| {
            let parts: Vec<&str> = mapping.split(PAIR_SEPARATOR).collect();
            match parts.as_slice() {
                [external, internal] => Ok(GroupMapEntry::new(*external, *internal)),
                _ => Err(GroupMapError::Malformed {
                    entry: mapping.to_string(),
                }),
            }
        })
        .collect()
}

/// Whether any entry hands a protected role (an access group or `admin`)
/// to the external directory.
pub fn targets_protected_role(entries: &[GroupMapEntry]) -> bool {
    entries.iter().any(|entry| is_protected_role(&entry.internal))
}

/// Parse a raw group map.
///
/// Returns an empty map for `None`, and also when any entry targets a
/// protected role. Entry order is preserved.
pub fn build_postgresql_group_map(raw: Option<&str>) -> Result<Vec<GroupMapEntry>, GroupMapError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let entries = parse_group_map(raw)?;
    if targets_protected_role(&entries) {
        tracing::debug!("group map targets a protected role, ignoring it");
        return Ok(Vec::new());
    }
    Ok(entries)
}
