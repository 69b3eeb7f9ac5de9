// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Administration Service
//!
//! [`PostgreSql`] is the entry point the operator calls once per lifecycle
//! event. It owns a [`ConnectionManager`] and exposes the administration
//! operations, implemented across the sibling modules:
//!
//! | Module | Operations |
//! |--------|-----------|
//! | `access_groups` | `create_access_groups`, `grant_*_access_group_memberships`, `list_access_groups` |
//! | `provisioning` | `create_database`, `database_exists`, `enable_disable_extensions` |
//! | `audit` | `configure_pgaudit` |
//! | `archiving` | `get_last_archived_wal` |
//! | `group_map` | `validate_group_map`, `build_postgresql_group_map` |
//!
//! Every operation is idempotent and safe to re-run; callers racing on the
//! same objects rely on PostgreSQL's own uniqueness checks.

use std::sync::Arc;

use crate::application::connection::ConnectionManager;
use crate::domain::connection::ConnectionDescriptor;
use crate::domain::parameters::{self, ConfigOptions, ParameterError, PostgreSqlParameters};
use crate::domain::session::SessionFactory;
use crate::infrastructure::db::SqlxSessionFactory;

#[derive(Clone)]
pub struct PostgreSql {
    pub(crate) connections: ConnectionManager,
}

impl PostgreSql {
    pub fn new(descriptor: ConnectionDescriptor, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            connections: ConnectionManager::new(descriptor, factory),
        }
    }

    /// Administration service talking to a real server through sqlx.
    pub fn with_sqlx(descriptor: ConnectionDescriptor) -> Self {
        Self::new(descriptor, Arc::new(SqlxSessionFactory::new()))
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        self.connections.descriptor()
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// See [`parameters::build_postgresql_parameters`]. Pure; no connection
    /// is opened.
    pub fn build_postgresql_parameters(
        options: &ConfigOptions,
        available_memory: u64,
        max_memory: Option<u64>,
    ) -> Result<PostgreSqlParameters, ParameterError> {
        parameters::build_postgresql_parameters(options, available_memory, max_memory)
    }
}
