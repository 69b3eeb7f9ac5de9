// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Access-group reconciliation: the fixed roles exist, and the internal and
//! relation users are members of the right one. Safe to run on every event.

use crate::application::connection::ScopedConnection;
use crate::application::postgresql::PostgreSql;
use crate::domain::access_group::AccessGroup;
use crate::domain::errors::PostgreSqlError;
use crate::domain::sql::{queries, Statement};

impl PostgreSql {
    /// Create every missing access group as a `NOLOGIN` role, in
    /// declaration order. Existing groups are left untouched.
    pub async fn create_access_groups(&self) -> Result<(), PostgreSqlError> {
        let mut connection = self.connections.connect_primary().await?;

        for group in AccessGroup::ALL {
            let exists = Statement::new(queries::ROLE_EXISTS).literal(group.role_name());
            if connection.fetch_optional(&exists).await?.is_some() {
                continue;
            }

            let create = Statement::new(queries::CREATE_ROLE_NOLOGIN).identifier(group.role_name());
            match connection.execute(&create).await {
                Ok(_) => {
                    tracing::info!(group = %group, "created access group");
                    metrics::counter!("postgresql_roles_created_total").increment(1);
                }
                Err(err) if err.is_already_exists() => {
                    tracing::warn!(group = %group, "access group created concurrently");
                }
                Err(err) => return Err(err.into()),
            }
        }

        connection.release().await?;
        Ok(())
    }

    /// Access groups currently present in the database, in declaration order.
    pub async fn list_access_groups(&self) -> Result<Vec<AccessGroup>, PostgreSqlError> {
        let mut connection = self.connections.connect_primary().await?;
        let mut present = Vec::new();
        for group in AccessGroup::ALL {
            let exists = Statement::new(queries::ROLE_EXISTS).literal(group.role_name());
            if connection.fetch_optional(&exists).await?.is_some() {
                present.push(group);
            }
        }
        connection.release().await?;
        Ok(present)
    }

    /// Grant the internal access group to every system user.
    pub async fn grant_internal_access_group_memberships(&self) -> Result<(), PostgreSqlError> {
        let users = self.descriptor().system_users.clone();
        let mut connection = self.connections.connect_primary().await?;
        for user in users {
            grant(&mut connection, AccessGroup::Internal, user).await?;
        }
        connection.release().await?;
        Ok(())
    }

    /// Grant the relation access group to every user whose name matches the
    /// relation naming conventions. Those users are created by other
    /// services, so they are discovered by pattern.
    pub async fn grant_relation_access_group_memberships(&self) -> Result<(), PostgreSqlError> {
        let mut connection = self.connections.connect_primary().await?;

        let rows = connection.fetch_all(&Statement::raw(queries::RELATION_USERS)).await?;
        let usernames: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get(0).map(str::to_string))
            .collect();
        tracing::debug!(count = usernames.len(), "found relation users");

        for username in usernames {
            grant(&mut connection, AccessGroup::Relation, username).await?;
        }

        connection.release().await?;
        Ok(())
    }
}

async fn grant(
    connection: &mut ScopedConnection,
    group: AccessGroup,
    user: String,
) -> Result<(), PostgreSqlError> {
    let statement = Statement::new(queries::GRANT_ROLE)
        .identifier(group.role_name())
        .identifier(user);
    connection.execute(&statement).await?;
    Ok(())
}
