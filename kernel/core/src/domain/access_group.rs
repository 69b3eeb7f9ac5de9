// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Access Groups
//!
//! The fixed set of `NOLOGIN` roles that bundle privileges for a class of
//! users, plus the built-in users that belong to them. The set is closed:
//! it is never discovered from the database.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Administrative role that must never be the target of an external group map.
pub const ADMIN_ROLE: &str = "admin";

pub const MONITORING_USER: &str = "monitoring";
pub const REPLICATION_USER: &str = "replication";
pub const REWIND_USER: &str = "rewind";
pub const OPERATOR_USER: &str = "operator";

/// Built-in users granted into [`AccessGroup::Internal`], in grant order.
pub const SYSTEM_USERS: [&str; 4] = [MONITORING_USER, REPLICATION_USER, REWIND_USER, OPERATOR_USER];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessGroup {
    /// Users mapped in from an external identity provider (LDAP).
    Identity,
    /// Users the operator itself runs as.
    Internal,
    /// Users created for client relations.
    Relation,
}

impl AccessGroup {
    /// Every access group, in declaration order.
    pub const ALL: [AccessGroup; 3] = [AccessGroup::Identity, AccessGroup::Internal, AccessGroup::Relation];

    pub fn role_name(self) -> &'static str {
        match self {
            AccessGroup::Identity => "identity_access",
            AccessGroup::Internal => "internal_access",
            AccessGroup::Relation => "relation_access",
        }
    }

    pub fn from_role_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|group| group.role_name() == name)
    }
}

impl fmt::Display for AccessGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.role_name())
    }
}

/// Whether `role` is reserved and may not be targeted by a group map.
pub fn is_protected_role(role: &str) -> bool {
    role == ADMIN_ROLE || AccessGroup::from_role_name(role).is_some()
}

/// `LIKE` patterns matching usernames generated for relations, pgbouncer
/// authentication and logical replication. Mirrors the filter in
/// [`crate::domain::sql::queries::RELATION_USERS`].
pub const RELATION_USER_PATTERNS: [&str; 5] = [
    "relation_id_%",
    "relation-%",
    "pgbouncer_auth_relation_%",
    "%_user_%_%",
    "logical_replication_relation_%",
];

/// Evaluate a SQL `LIKE` pattern (`%` and `_` wildcards, no escape character).
pub fn like_matches(pattern: &str, value: &str) -> bool {
    fn matches(pattern: &[char], value: &[char]) -> bool {
        match pattern.split_first() {
            None => value.is_empty(),
            Some(('%', rest)) => (0..=value.len()).any(|skip| matches(rest, &value[skip..])),
            Some(('_', rest)) => !value.is_empty() && matches(rest, &value[1..]),
            Some((c, rest)) => value.first() == Some(c) && matches(rest, &value[1..]),
        }
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();
    matches(&pattern, &value)
}

/// Whether `username` looks like a dynamically created relation user.
pub fn is_relation_user(username: &str) -> bool {
    RELATION_USER_PATTERNS
        .iter()
        .any(|pattern| like_matches(pattern, username))
}
