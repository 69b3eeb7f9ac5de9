// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer: value types, pure calculations and the driver seam.
//!
//! Nothing in this layer performs I/O.

pub mod access_group;
pub mod connection;
pub mod errors;
pub mod group_map;
pub mod parameters;
pub mod session;
pub mod sql;

pub use access_group::{AccessGroup, ADMIN_ROLE, SYSTEM_USERS};
pub use connection::{ConnectionDescriptor, ConnectionTarget};
pub use errors::{PostgreSqlError, SessionError};
pub use group_map::{build_postgresql_group_map, GroupMapEntry, GroupMapError};
pub use parameters::{
    build_postgresql_parameters, ConfigOptions, ParameterError, ParameterValue, PostgreSqlParameters, Profile,
};
pub use session::{PostgreSqlSession, SessionFactory, SqlRow};
pub use sql::{Fragment, Statement};
