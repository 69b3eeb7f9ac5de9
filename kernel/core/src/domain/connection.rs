// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Connection Descriptor
//!
//! Everything needed to open a privileged connection to the managed
//! instance. Built fresh by the caller for every operation from its current
//! state; nothing here is cached between calls.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

use crate::domain::access_group::SYSTEM_USERS;

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DATABASE: &str = "postgres";

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    /// Host of the current primary; default target of every connection.
    pub primary_host: String,

    /// Host of the unit running this code.
    pub current_host: String,

    pub user: String,

    pub password: String,

    #[serde(default = "default_database")]
    pub database: String,

    /// Built-in users granted into the internal access group, in order,
    /// without duplicates.
    #[serde(default = "default_system_users", deserialize_with = "deserialize_system_users")]
    pub system_users: Vec<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

fn default_system_users() -> Vec<String> {
    SYSTEM_USERS.iter().map(|user| user.to_string()).collect()
}

fn deserialize_system_users<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<String>::deserialize(deserializer).map(unique_users)
}

/// Drop repeated users; first occurrence wins.
fn unique_users<I, S>(users: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut unique: Vec<String> = Vec::new();
    for user in users.into_iter().map(Into::into) {
        if !unique.contains(&user) {
            unique.push(user);
        }
    }
    unique
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(1)
}

impl ConnectionDescriptor {
    pub fn new(
        primary_host: impl Into<String>,
        current_host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            primary_host: primary_host.into(),
            current_host: current_host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
            system_users: default_system_users(),
            port: DEFAULT_PORT,
            connect_timeout: default_connect_timeout(),
        }
    }

    /// Replace the system users; duplicates are dropped, first occurrence wins.
    pub fn with_system_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.system_users = unique_users(users);
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Resolve a target to the concrete (host, database) pair to dial.
    pub fn resolve<'a>(&'a self, target: &'a ConnectionTarget) -> (&'a str, &'a str) {
        let host = match &target.host {
            Some(TargetHost::Current) => self.current_host.as_str(),
            Some(TargetHost::Named(host)) => host.as_str(),
            None => self.primary_host.as_str(),
        };
        let database = target.database.as_deref().unwrap_or(&self.database);
        (host, database)
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("primary_host", &self.primary_host)
            .field("current_host", &self.current_host)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("system_users", &self.system_users)
            .field("port", &self.port)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetHost {
    Current,
    Named(String),
}

/// Which database, on which host, a connection should reach. The default
/// is the descriptor's database on the primary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub database: Option<String>,
    pub host: Option<TargetHost>,
}

impl ConnectionTarget {
    pub fn primary() -> Self {
        Self::default()
    }

    pub fn database(name: impl Into<String>) -> Self {
        Self {
            database: Some(name.into()),
            host: None,
        }
    }

    pub fn on_current_host(mut self) -> Self {
        self.host = Some(TargetHost::Current);
        self
    }

    pub fn on_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(TargetHost::Named(host.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ConnectionDescriptor {
        ConnectionDescriptor::new("10.0.0.1", "10.0.0.2", "operator", "s3cret", "postgres")
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", descriptor());
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_resolve_defaults_to_primary() {
        let descriptor = descriptor();
        let target = ConnectionTarget::primary();
        assert_eq!(descriptor.resolve(&target), ("10.0.0.1", "postgres"));

        let target = ConnectionTarget::database("app").on_current_host();
        assert_eq!(descriptor.resolve(&target), ("10.0.0.2", "app"));
    }

    #[test]
    fn test_system_users_deduplicated() {
        let descriptor = descriptor().with_system_users(["a", "b", "a"]);
        assert_eq!(descriptor.system_users, vec!["a".to_string(), "b".to_string()]);
    }
}
