// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Error Taxonomy
//!
//! [`SessionError`] is what the driver seam reports. Operations catch it at
//! their boundary and re-raise the typed [`PostgreSqlError`] variant the
//! caller can act on.

use thiserror::Error;

use crate::domain::sql::StatementError;

/// SQLSTATE codes the operations react to.
pub mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const DUPLICATE_DATABASE: &str = "42P04";
    pub const DUPLICATE_OBJECT: &str = "42710";
    pub const DEPENDENT_OBJECTS_STILL_EXIST: &str = "2BP01";
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("failed to connect to {host}/{database}: {message}")]
    Connect {
        host: String,
        database: String,
        message: String,
    },

    #[error("timed out connecting to {host}/{database}")]
    Timeout { host: String, database: String },

    #[error("statement failed{}: {message}", code_suffix(.code))]
    Statement {
        code: Option<String>,
        message: String,
    },

    #[error("unexpected result: {0}")]
    Decode(String),

    #[error("connection already released")]
    Released,

    #[error(transparent)]
    Render(#[from] StatementError),
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default()
}

impl SessionError {
    pub fn statement(code: Option<&str>, message: impl Into<String>) -> Self {
        SessionError::Statement {
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// SQLSTATE of a failed statement, if the server reported one.
    pub fn code(&self) -> Option<&str> {
        match self {
            SessionError::Statement { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.code() == Some(code)
    }

    /// The object being created already exists, usually because a
    /// concurrent request created it first.
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self.code(),
            Some(sqlstate::UNIQUE_VIOLATION | sqlstate::DUPLICATE_DATABASE | sqlstate::DUPLICATE_OBJECT)
        )
    }
}

#[derive(Debug, Error)]
pub enum PostgreSqlError {
    #[error("failed to create database {database}: {source}")]
    CreateDatabase {
        database: String,
        #[source]
        source: SessionError,
    },

    #[error("failed to get the last archived WAL: {0}")]
    GetLastArchivedWal(#[source] SessionError),

    #[error("failed to enable/disable extensions: {0}")]
    EnableDisableExtension(#[source] SessionError),

    #[error("cannot drop extension {extension}: other objects depend on it")]
    DependentObjectsStillExist {
        extension: String,
        #[source]
        source: SessionError,
    },

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_error_display() {
        let err = SessionError::statement(Some("42P04"), "database exists");
        assert_eq!(err.to_string(), "statement failed [42P04]: database exists");
        assert!(err.is_already_exists());

        let err = SessionError::statement(None, "boom");
        assert_eq!(err.to_string(), "statement failed: boom");
        assert!(!err.is_already_exists());
    }
}
