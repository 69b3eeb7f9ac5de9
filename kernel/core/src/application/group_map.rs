// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! LDAP group-map validation against the roles that exist in the database.

use crate::application::postgresql::PostgreSql;
use crate::domain::errors::PostgreSqlError;
use crate::domain::group_map::{self, GroupMapEntry, GroupMapError};
use crate::domain::sql::{queries, Statement};

impl PostgreSql {
    /// See [`group_map::build_postgresql_group_map`].
    pub fn build_postgresql_group_map(raw: Option<&str>) -> Result<Vec<GroupMapEntry>, GroupMapError> {
        group_map::build_postgresql_group_map(raw)
    }

    /// Whether `raw` is an acceptable group map.
    ///
    /// `None` (mapping disabled) is valid. Otherwise the map must parse, must
    /// not target a protected role, and every internal role must exist. Bad
    /// content yields `Ok(false)`; only connection and statement failures
    /// are errors.
    pub async fn validate_group_map(&self, raw: Option<&str>) -> Result<bool, PostgreSqlError> {
        let Some(raw) = raw else {
            return Ok(true);
        };

        let entries = match group_map::parse_group_map(raw) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!(error = %err, "invalid group map");
                return Ok(false);
            }
        };
        if group_map::targets_protected_role(&entries) {
            tracing::debug!("group map targets a protected role");
            return Ok(false);
        }

        for entry in entries {
            let mut connection = self.connections.connect_primary().await?;
            let exists = Statement::new(queries::ROLE_EXISTS).literal(entry.internal.as_str());
            let found = connection.fetch_optional(&exists).await?.is_some();
            connection.release().await?;

            if !found {
                tracing::debug!(role = %entry.internal, "group map references a missing role");
                return Ok(false);
            }
        }

        Ok(true)
    }
}
