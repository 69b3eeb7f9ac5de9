// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod in_memory;

pub use db::{SqlxSession, SqlxSessionFactory};
pub use in_memory::{InMemoryPostgreSql, InMemorySession, RecordedStatement};
