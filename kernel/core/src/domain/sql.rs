// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # SQL Statement Builder
//!
//! Composes SQL from a `'static` template and an ordered list of typed
//! fragments. Caller-controlled strings can only enter a statement as an
//! [`Fragment::Identifier`] (quoted as an identifier) or a
//! [`Fragment::Literal`] (sent as a bind parameter), so no combination of
//! input can change the shape of the statement.
//!
//! ```
//! use kernel_postgresql_core::domain::sql::Statement;
//!
//! let grant = Statement::new("GRANT {} TO {};")
//!     .identifier("internal_access")
//!     .identifier("operator");
//! assert_eq!(grant.render().unwrap().sql, r#"GRANT "internal_access" TO "operator";"#);
//! ```
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Injection-safe statement construction

use std::fmt;
use thiserror::Error;

const PLACEHOLDER: &str = "{}";

/// Fixed statement templates issued by the administration operations.
///
/// Session implementations that interpret statements (the in-memory double)
/// match on these constants rather than on rendered SQL.
pub mod queries {
    pub const ROLE_EXISTS: &str = "SELECT TRUE FROM pg_roles WHERE rolname={};";
    pub const CREATE_ROLE_NOLOGIN: &str = "CREATE ROLE {} NOLOGIN;";
    pub const GRANT_ROLE: &str = "GRANT {} TO {};";
    pub const RELATION_USERS: &str = "SELECT usename FROM pg_catalog.pg_user WHERE usename LIKE 'relation_id_%' OR usename LIKE 'relation-%' OR usename LIKE 'pgbouncer_auth_relation_%' OR usename LIKE '%_user_%_%' OR usename LIKE 'logical_replication_relation_%';";

    pub const DATABASE_EXISTS: &str = "SELECT datname FROM pg_database WHERE datname={};";
    pub const CREATE_DATABASE: &str = "CREATE DATABASE {};";
    pub const REVOKE_DATABASE_FROM_PUBLIC: &str = "REVOKE ALL PRIVILEGES ON DATABASE {} FROM PUBLIC;";
    pub const LIST_DATABASES: &str = "SELECT datname FROM pg_database WHERE NOT datistemplate;";
    pub const CREATE_EXTENSION: &str = "CREATE EXTENSION IF NOT EXISTS {};";
    pub const DROP_EXTENSION: &str = "DROP EXTENSION IF EXISTS {};";

    pub const PGAUDIT_SET_LOG: &str = "ALTER SYSTEM SET pgaudit.log = 'ROLE,DDL,MISC,MISC_SET';";
    pub const PGAUDIT_SET_LOG_CLIENT: &str = "ALTER SYSTEM SET pgaudit.log_client TO off;";
    pub const PGAUDIT_SET_LOG_PARAMETER: &str = "ALTER SYSTEM SET pgaudit.log_parameter TO off;";
    pub const PGAUDIT_RESET_LOG: &str = "ALTER SYSTEM RESET pgaudit.log;";
    pub const PGAUDIT_RESET_LOG_CLIENT: &str = "ALTER SYSTEM RESET pgaudit.log_client;";
    pub const PGAUDIT_RESET_LOG_PARAMETER: &str = "ALTER SYSTEM RESET pgaudit.log_parameter;";
    pub const RELOAD_CONF: &str = "SELECT pg_reload_conf();";

    pub const LAST_ARCHIVED_WAL: &str = "SELECT last_archived_wal FROM pg_stat_archiver;";
}

/// Statement construction errors. These indicate a programming error in a
/// template or a value PostgreSQL cannot represent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatementError {
    #[error("template {template:?} has {placeholders} placeholders but {fragments} fragments were supplied")]
    PlaceholderMismatch {
        template: &'static str,
        placeholders: usize,
        fragments: usize,
    },

    #[error("fragment contains a NUL byte: {0:?}")]
    NulByte(String),
}

/// A caller-supplied value bound into a template placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fragment {
    /// Object name (role, database, extension); quoted with `"`.
    Identifier(String),
    /// Value; sent as a bind parameter.
    Literal(String),
}

impl Fragment {
    pub fn value(&self) -> &str {
        match self {
            Self::Identifier(value) | Self::Literal(value) => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    template: &'static str,
    fragments: Vec<Fragment>,
}

/// Wire form of a [`Statement`]: SQL text with `$n` placeholders plus the
/// values to bind, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedStatement {
    pub sql: String,
    pub binds: Vec<String>,
}

impl Statement {
    pub fn new(template: &'static str) -> Self {
        Self {
            template,
            fragments: Vec::new(),
        }
    }

    /// A statement without placeholders.
    pub fn raw(sql: &'static str) -> Self {
        Self::new(sql)
    }

    pub fn identifier(mut self, name: impl Into<String>) -> Self {
        self.fragments.push(Fragment::Identifier(name.into()));
        self
    }

    pub fn literal(mut self, value: impl Into<String>) -> Self {
        self.fragments.push(Fragment::Literal(value.into()));
        self
    }

    pub fn template(&self) -> &'static str {
        self.template
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Value of the n-th fragment regardless of its kind.
    pub fn fragment_value(&self, index: usize) -> Option<&str> {
        self.fragments.get(index).map(Fragment::value)
    }

    pub fn has_binds(&self) -> bool {
        self.fragments
            .iter()
            .any(|fragment| matches!(fragment, Fragment::Literal(_)))
    }

    /// Render for execution: identifiers quoted inline, literals as `$n`.
    pub fn render(&self) -> Result<RenderedStatement, StatementError> {
        let mut binds = Vec::new();
        let sql = self.interpolate(|fragment| match fragment {
            Fragment::Identifier(name) => Ok(quote_identifier(name)),
            Fragment::Literal(value) => {
                binds.push(value.clone());
                Ok(format!("${}", binds.len()))
            }
        })?;
        Ok(RenderedStatement { sql, binds })
    }

    /// Render with literals quoted inline. Used for log output.
    pub fn to_inline_sql(&self) -> Result<String, StatementError> {
        self.interpolate(|fragment| match fragment {
            Fragment::Identifier(name) => Ok(quote_identifier(name)),
            Fragment::Literal(value) => Ok(quote_literal(value)),
        })
    }

    fn interpolate<F>(&self, mut render_fragment: F) -> Result<String, StatementError>
    where
        F: FnMut(&Fragment) -> Result<String, StatementError>,
    {
        let placeholders = self.template.matches(PLACEHOLDER).count();
        if placeholders != self.fragments.len() {
            return Err(StatementError::PlaceholderMismatch {
                template: self.template,
                placeholders,
                fragments: self.fragments.len(),
            });
        }

        let mut sql = String::with_capacity(self.template.len());
        let mut pieces = self.template.split(PLACEHOLDER);
        if let Some(head) = pieces.next() {
            sql.push_str(head);
        }
        for (fragment, piece) in self.fragments.iter().zip(pieces) {
            if fragment.value().contains('\0') {
                return Err(StatementError::NulByte(fragment.value().to_string()));
            }
            sql.push_str(&render_fragment(fragment)?);
            sql.push_str(piece);
        }
        Ok(sql)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_inline_sql() {
            Ok(sql) => f.write_str(&sql),
            Err(_) => f.write_str(self.template),
        }
    }
}

/// Quote an identifier: wrap in `"` and double embedded quotes.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string literal. Backslashes switch to the `E''` form so the
/// result is correct regardless of `standard_conforming_strings`.
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    if escaped.contains('\\') {
        format!("E'{}'", escaped.replace('\\', "\\\\"))
    } else {
        format!("'{escaped}'")
    }
}
