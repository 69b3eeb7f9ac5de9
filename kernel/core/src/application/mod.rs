// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod connection;
pub mod postgresql;

mod access_groups;
mod archiving;
mod audit;
mod group_map;
mod provisioning;

pub use connection::{ConnectionManager, ScopedConnection};
pub use postgresql::PostgreSql;
pub use provisioning::PGAUDIT_EXTENSION;
