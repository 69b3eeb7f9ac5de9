// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Kernel PostgreSQL Core
//!
//! Administrative control layer for a managed PostgreSQL instance: access
//! groups and grants, database and extension provisioning, memory-aware
//! parameter calculation, pgAudit toggling, WAL archiver status and LDAP
//! group-map validation.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Entry point re-exporting the administration API

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use application::{ConnectionManager, PostgreSql, ScopedConnection};
pub use domain::*;
