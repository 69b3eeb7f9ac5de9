// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Database Provisioning
//!
//! Databases are created on request and extensions reconciled afterwards.
//! Two relations asking for the same database may race: the loser either
//! sees the database in the existence check or gets a duplicate error from
//! `CREATE DATABASE`, and both cases are treated as "already exists".
//! `PUBLIC` access is revoked on every request, not only by the creator.
//! Extensions are only touched once creation has succeeded.

use std::collections::BTreeMap;

use crate::application::postgresql::PostgreSql;
use crate::domain::connection::ConnectionTarget;
use crate::domain::errors::{sqlstate, PostgreSqlError, SessionError};
use crate::domain::sql::{queries, Statement};

pub const PGAUDIT_EXTENSION: &str = "pgaudit";

impl PostgreSql {
    /// Create `database` if it does not exist, then enable `plugins` in it.
    pub async fn create_database<I, S>(&self, database: &str, plugins: I) -> Result<(), PostgreSqlError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ensure_database(database)
            .await
            .map_err(|source| PostgreSqlError::CreateDatabase {
                database: database.to_string(),
                source,
            })?;

        let extensions: BTreeMap<String, bool> = plugins.into_iter().map(|plugin| (plugin.into(), true)).collect();
        self.enable_disable_extensions(&extensions, Some(database)).await
    }

    pub async fn database_exists(&self, database: &str) -> Result<bool, PostgreSqlError> {
        let mut connection = self.connections.connect_primary().await?;
        let exists = connection
            .fetch_optional(&Statement::new(queries::DATABASE_EXISTS).literal(database))
            .await?
            .is_some();
        connection.release().await?;
        Ok(exists)
    }

    /// Names of all non-template databases.
    pub async fn list_databases(&self) -> Result<Vec<String>, PostgreSqlError> {
        let mut connection = self.connections.connect_primary().await?;
        let rows = connection.fetch_all(&Statement::raw(queries::LIST_DATABASES)).await?;
        connection.release().await?;
        Ok(rows.iter().filter_map(|row| row.get(0).map(str::to_string)).collect())
    }

    /// Enable (`true`) or drop (`false`) each extension, in `database` or,
    /// when `None`, in every non-template database. When the request
    /// mentions pgAudit, its server settings follow the requested state.
    pub async fn enable_disable_extensions(
        &self,
        extensions: &BTreeMap<String, bool>,
        database: Option<&str>,
    ) -> Result<(), PostgreSqlError> {
        if extensions.is_empty() {
            return Ok(());
        }

        let databases = match database {
            Some(database) => vec![database.to_string()],
            None => self.list_databases().await.map_err(|err| match err {
                PostgreSqlError::Session(source) => PostgreSqlError::EnableDisableExtension(source),
                other => other,
            })?,
        };

        for database in databases {
            let mut connection = self
                .connections
                .connect(ConnectionTarget::database(database.as_str()))
                .await
                .map_err(PostgreSqlError::EnableDisableExtension)?;

            for (extension, enable) in extensions {
                let template = if *enable {
                    queries::CREATE_EXTENSION
                } else {
                    queries::DROP_EXTENSION
                };
                let statement = Statement::new(template).identifier(extension.as_str());
                match connection.execute(&statement).await {
                    Ok(_) => {}
                    Err(err) if err.has_code(sqlstate::UNIQUE_VIOLATION) => {
                        tracing::warn!(%extension, %database, "extension created concurrently");
                    }
                    Err(err) if err.has_code(sqlstate::DEPENDENT_OBJECTS_STILL_EXIST) => {
                        return Err(PostgreSqlError::DependentObjectsStillExist {
                            extension: extension.clone(),
                            source: err,
                        });
                    }
                    Err(err) => return Err(PostgreSqlError::EnableDisableExtension(err)),
                }
            }

            connection
                .release()
                .await
                .map_err(PostgreSqlError::EnableDisableExtension)?;
        }

        if let Some(enable) = extensions.get(PGAUDIT_EXTENSION) {
            self.configure_pgaudit(*enable).await.map_err(|err| match err {
                PostgreSqlError::Session(source) => PostgreSqlError::EnableDisableExtension(source),
                other => other,
            })?;
        }

        Ok(())
    }

    /// Returns whether this call created the database. Public access is
    /// revoked whenever the database exists afterwards, so a retry repairs a
    /// database whose earlier REVOKE failed.
    async fn ensure_database(&self, database: &str) -> Result<bool, SessionError> {
        let mut connection = self.connections.connect_primary().await?;

        let exists = Statement::new(queries::DATABASE_EXISTS).literal(database);
        let created = if connection.fetch_optional(&exists).await?.is_some() {
            false
        } else {
            let create = Statement::new(queries::CREATE_DATABASE).identifier(database);
            match connection.execute(&create).await {
                Ok(_) => true,
                Err(err) if err.is_already_exists() => {
                    tracing::warn!(%database, "database created concurrently");
                    false
                }
                Err(err) => return Err(err),
            }
        };

        let revoke = Statement::new(queries::REVOKE_DATABASE_FROM_PUBLIC).identifier(database);
        connection.execute(&revoke).await?;
        connection.release().await?;

        if created {
            tracing::info!(%database, "created database");
            metrics::counter!("postgresql_databases_created_total").increment(1);
        }
        Ok(created)
    }
}
