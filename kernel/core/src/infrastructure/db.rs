// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Sessions over sqlx
//!
//! Production [`SessionFactory`] backed by a dedicated `sqlx::PgConnection`
//! per session. Connections are deliberately not pooled: every
//! administration call dials, runs its statements in autocommit mode, and
//! closes.
//!
//! Statements carrying literals go through the extended protocol with bind
//! parameters; statements without any (DDL, `ALTER SYSTEM`) use the simple
//! protocol, since several of them cannot run as prepared statements.

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection, Executor, Row, TypeInfo};

use crate::domain::connection::{ConnectionDescriptor, ConnectionTarget};
use crate::domain::errors::SessionError;
use crate::domain::session::{PostgreSqlSession, SessionFactory, SqlRow};
use crate::domain::sql::Statement;

const APPLICATION_NAME: &str = "kernel-postgresql-admin";

#[derive(Debug, Clone, Default)]
pub struct SqlxSessionFactory;

impl SqlxSessionFactory {
    pub fn new() -> Self {
        Self
    }

    fn connect_options(descriptor: &ConnectionDescriptor, host: &str, database: &str) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(host)
            .port(descriptor.port)
            .username(&descriptor.user)
            .password(&descriptor.password)
            .database(database)
            .application_name(APPLICATION_NAME)
    }
}

#[async_trait]
impl SessionFactory for SqlxSessionFactory {
    async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn PostgreSqlSession>, SessionError> {
        let (host, database) = descriptor.resolve(target);
        let options = Self::connect_options(descriptor, host, database);

        let connection = PgConnection::connect_with(&options)
            .await
            .map_err(|e| SessionError::Connect {
                host: host.to_string(),
                database: database.to_string(),
                message: e.to_string(),
            })?;

        Ok(Box::new(SqlxSession { connection }))
    }
}

pub struct SqlxSession {
    connection: PgConnection,
}

impl SqlxSession {
    async fn query(&mut self, statement: &Statement) -> Result<Vec<PgRow>, SessionError> {
        let rendered = statement.render()?;
        if rendered.binds.is_empty() {
            return Executor::fetch_all(&mut self.connection, sqlx::raw_sql(&rendered.sql))
                .await
                .map_err(statement_error);
        }

        let mut query = sqlx::query(&rendered.sql);
        for value in &rendered.binds {
            query = query.bind(value.as_str());
        }
        query
            .fetch_all(&mut self.connection)
            .await
            .map_err(statement_error)
    }
}

#[async_trait]
impl PostgreSqlSession for SqlxSession {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, SessionError> {
        let rendered = statement.render()?;
        let result = if rendered.binds.is_empty() {
            Executor::execute(&mut self.connection, sqlx::raw_sql(&rendered.sql)).await
        } else {
            let mut query = sqlx::query(&rendered.sql);
            for value in &rendered.binds {
                query = query.bind(value.as_str());
            }
            query.execute(&mut self.connection).await
        };
        result.map(|done| done.rows_affected()).map_err(statement_error)
    }

    async fn fetch_optional(&mut self, statement: &Statement) -> Result<Option<SqlRow>, SessionError> {
        let rows = self.query(statement).await?;
        rows.first().map(decode_row).transpose()
    }

    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<SqlRow>, SessionError> {
        let rows = self.query(statement).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        self.connection.close().await.map_err(statement_error)
    }
}

fn statement_error(err: sqlx::Error) -> SessionError {
    match &err {
        sqlx::Error::Database(db) => SessionError::statement(db.code().as_deref(), db.message()),
        _ => SessionError::statement(None, err.to_string()),
    }
}

fn decode_row(row: &PgRow) -> Result<SqlRow, SessionError> {
    (0..row.len())
        .map(|index| decode_column(row, index))
        .collect::<Result<Vec<_>, _>>()
        .map(SqlRow::new)
}

/// Decode a column to text. Only the types the administration queries
/// return (`text`/`name`, `bool`, integers) are supported.
fn decode_column(row: &PgRow, index: usize) -> Result<Option<String>, SessionError> {
    if let Ok(value) = row.try_get::<Option<String>, _>(index) {
        return Ok(value);
    }
    if let Ok(value) = row.try_get::<Option<bool>, _>(index) {
        return Ok(value.map(|v| if v { "t" } else { "f" }.to_string()));
    }
    if let Ok(value) = row.try_get::<Option<i64>, _>(index) {
        return Ok(value.map(|v| v.to_string()));
    }
    if let Ok(value) = row.try_get::<Option<i32>, _>(index) {
        return Ok(value.map(|v| v.to_string()));
    }

    let column = row.column(index);
    Err(SessionError::Decode(format!(
        "column {} has unsupported type {}",
        column.name(),
        column.type_info().name()
    )))
}
