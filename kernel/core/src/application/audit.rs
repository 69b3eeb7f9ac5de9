// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! pgAudit server settings.

use crate::application::postgresql::PostgreSql;
use crate::domain::errors::PostgreSqlError;
use crate::domain::sql::{queries, Statement};

const ENABLE_STATEMENTS: [&str; 3] = [
    queries::PGAUDIT_SET_LOG,
    queries::PGAUDIT_SET_LOG_CLIENT,
    queries::PGAUDIT_SET_LOG_PARAMETER,
];

const DISABLE_STATEMENTS: [&str; 3] = [
    queries::PGAUDIT_RESET_LOG,
    queries::PGAUDIT_RESET_LOG_CLIENT,
    queries::PGAUDIT_RESET_LOG_PARAMETER,
];

impl PostgreSql {
    /// Persist (or reset) the pgAudit settings, then reload the server
    /// configuration. The reload is always the last statement and is not
    /// issued if a setting fails.
    pub async fn configure_pgaudit(&self, enable: bool) -> Result<(), PostgreSqlError> {
        let statements = if enable { ENABLE_STATEMENTS } else { DISABLE_STATEMENTS };

        let mut connection = self.connections.connect_primary().await?;
        for sql in statements {
            connection.execute(&Statement::raw(sql)).await?;
        }
        connection.execute(&Statement::raw(queries::RELOAD_CONF)).await?;
        connection.release().await?;

        tracing::info!(enable, "configured pgAudit");
        Ok(())
    }
}
