// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Session Interfaces
//!
//! The seam between the administration operations and the database driver.
//! Implemented in `crate::infrastructure`:
//!
//! | Trait | Implementations |
//! |-------|-----------------|
//! | `SessionFactory` | `SqlxSessionFactory`, `InMemoryPostgreSql` |
//! | `PostgreSqlSession` | `SqlxSession`, `InMemorySession` |

use async_trait::async_trait;

use crate::domain::connection::{ConnectionDescriptor, ConnectionTarget};
use crate::domain::errors::SessionError;
use crate::domain::sql::Statement;

/// A result row, every column decoded to text (`None` for SQL `NULL`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlRow {
    columns: Vec<Option<String>>,
}

impl SqlRow {
    pub fn new(columns: Vec<Option<String>>) -> Self {
        Self { columns }
    }

    pub fn single(value: impl Into<String>) -> Self {
        Self::new(vec![Some(value.into())])
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.columns.get(index).and_then(|column| column.as_deref())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One open, privileged connection. Statements run in autocommit mode.
#[async_trait]
pub trait PostgreSqlSession: Send {
    /// Run a statement and return the number of affected rows.
    async fn execute(&mut self, statement: &Statement) -> Result<u64, SessionError>;

    /// Run a query and return its first row, if any.
    async fn fetch_optional(&mut self, statement: &Statement) -> Result<Option<SqlRow>, SessionError>;

    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<SqlRow>, SessionError>;

    /// Close the connection gracefully.
    async fn close(self: Box<Self>) -> Result<(), SessionError>;
}

/// Opens sessions against the instance described by a [`ConnectionDescriptor`].
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn PostgreSqlSession>, SessionError>;
}
