// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! WAL archiver status.

use crate::application::postgresql::PostgreSql;
use crate::domain::errors::{PostgreSqlError, SessionError};
use crate::domain::sql::{queries, Statement};

impl PostgreSql {
    /// Name of the most recently archived WAL segment, `None` if nothing has
    /// been archived yet. Every failure, including connecting, is reported
    /// as [`PostgreSqlError::GetLastArchivedWal`].
    pub async fn get_last_archived_wal(&self) -> Result<Option<String>, PostgreSqlError> {
        self.query_last_archived_wal()
            .await
            .map_err(PostgreSqlError::GetLastArchivedWal)
    }

    async fn query_last_archived_wal(&self) -> Result<Option<String>, SessionError> {
        let mut connection = self.connections.connect_primary().await?;
        let row = connection
            .fetch_optional(&Statement::raw(queries::LAST_ARCHIVED_WAL))
            .await?;
        connection.release().await?;

        let row = row.ok_or_else(|| SessionError::Decode("pg_stat_archiver returned no rows".to_string()))?;
        Ok(row.get(0).map(str::to_string))
    }
}
