// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Connection Manager
//!
//! Scoped acquisition of privileged connections. Every operation opens its
//! own connection through [`ConnectionManager::connect`] and works through
//! the returned [`ScopedConnection`]; there is no pooling and nothing is
//! reused across calls.
//!
//! The guard closes its connection gracefully on [`ScopedConnection::release`]
//! and drops it on any other exit path (`?`, early return, panic), which
//! closes the underlying socket.

use std::sync::Arc;

use crate::domain::connection::{ConnectionDescriptor, ConnectionTarget};
use crate::domain::errors::SessionError;
use crate::domain::session::{PostgreSqlSession, SessionFactory, SqlRow};
use crate::domain::sql::Statement;

#[derive(Clone)]
pub struct ConnectionManager {
    descriptor: Arc<ConnectionDescriptor>,
    factory: Arc<dyn SessionFactory>,
}

impl ConnectionManager {
    pub fn new(descriptor: ConnectionDescriptor, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            descriptor: Arc::new(descriptor),
            factory,
        }
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    /// Open a connection, bounded by the descriptor's connect timeout.
    pub async fn connect(&self, target: ConnectionTarget) -> Result<ScopedConnection, SessionError> {
        let (host, database) = self.descriptor.resolve(&target);
        let label = format!("{host}/{database}");

        let session = tokio::time::timeout(
            self.descriptor.connect_timeout,
            self.factory.open(&self.descriptor, &target),
        )
        .await
        .map_err(|_| SessionError::Timeout {
            host: host.to_string(),
            database: database.to_string(),
        })??;

        tracing::debug!(connection = %label, "connection acquired");
        Ok(ScopedConnection {
            session: Some(session),
            label,
        })
    }

    /// Connection to the descriptor's database on the primary.
    pub async fn connect_primary(&self) -> Result<ScopedConnection, SessionError> {
        self.connect(ConnectionTarget::primary()).await
    }
}

/// Guard over one open connection.
pub struct ScopedConnection {
    session: Option<Box<dyn PostgreSqlSession>>,
    label: String,
}

impl ScopedConnection {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn execute(&mut self, statement: &Statement) -> Result<u64, SessionError> {
        tracing::debug!(connection = %self.label, sql = %statement, "execute");
        let result = self.session()?.execute(statement).await;
        record_failure(&result);
        result
    }

    pub async fn fetch_optional(&mut self, statement: &Statement) -> Result<Option<SqlRow>, SessionError> {
        tracing::debug!(connection = %self.label, sql = %statement, "fetch_optional");
        let result = self.session()?.fetch_optional(statement).await;
        record_failure(&result);
        result
    }

    pub async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<SqlRow>, SessionError> {
        tracing::debug!(connection = %self.label, sql = %statement, "fetch_all");
        let result = self.session()?.fetch_all(statement).await;
        record_failure(&result);
        result
    }

    /// Close the connection gracefully.
    pub async fn release(mut self) -> Result<(), SessionError> {
        match self.session.take() {
            Some(session) => {
                tracing::debug!(connection = %self.label, "connection released");
                session.close().await
            }
            None => Ok(()),
        }
    }

    fn session(&mut self) -> Result<&mut (dyn PostgreSqlSession + 'static), SessionError> {
        self.session.as_deref_mut().ok_or(SessionError::Released)
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!(connection = %self.label, "connection dropped without release");
        }
    }
}

fn record_failure<T>(result: &Result<T, SessionError>) {
    if result.is_err() {
        metrics::counter!("postgresql_statement_failures_total").increment(1);
    }
}
