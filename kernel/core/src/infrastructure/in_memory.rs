// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # In-Memory PostgreSQL
//!
//! A [`SessionFactory`] that interprets the fixed administration statements
//! against an in-process catalog instead of a server. Used for development
//! and tests: every statement is recorded in order, failures can be
//! injected per statement template, and open sessions are counted so
//! callers can check that connections are released.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::domain::access_group::is_relation_user;
use crate::domain::connection::{ConnectionDescriptor, ConnectionTarget};
use crate::domain::errors::{sqlstate, SessionError};
use crate::domain::session::{PostgreSqlSession, SessionFactory, SqlRow};
use crate::domain::sql::{queries, Statement};

const UNDEFINED_OBJECT: &str = "42704";
const INVALID_CATALOG_NAME: &str = "3D000";

/// A statement as seen by the in-memory server, with the database of the
/// session that ran it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedStatement {
    pub database: String,
    pub statement: Statement,
}

#[derive(Debug, Default)]
struct Catalog {
    roles: BTreeSet<String>,
    login_users: BTreeSet<String>,
    memberships: BTreeSet<(String, String)>,
    databases: BTreeSet<String>,
    extensions: BTreeMap<String, BTreeSet<String>>,
    system_settings: BTreeMap<String, String>,
    reloads: usize,
    last_archived_wal: Option<String>,

    statements: Vec<RecordedStatement>,
    failures: HashMap<&'static str, SessionError>,
    connect_failure: Option<SessionError>,
    racing_databases: BTreeSet<String>,
    open_sessions: usize,
    sessions_opened: usize,
}

#[derive(Clone, Default)]
pub struct InMemoryPostgreSql {
    catalog: Arc<Mutex<Catalog>>,
}

impl InMemoryPostgreSql {
    /// A fresh instance containing only the `postgres` database.
    pub fn new() -> Self {
        let server = Self::default();
        server.add_database("postgres");
        server
    }

    pub fn add_role(&self, name: &str) -> &Self {
        self.catalog.lock().roles.insert(name.to_string());
        self
    }

    /// Add a login user (visible in `pg_user`).
    pub fn add_user(&self, name: &str) -> &Self {
        let mut catalog = self.catalog.lock();
        catalog.roles.insert(name.to_string());
        catalog.login_users.insert(name.to_string());
        drop(catalog);
        self
    }

    pub fn add_database(&self, name: &str) -> &Self {
        self.catalog.lock().databases.insert(name.to_string());
        self
    }

    pub fn set_last_archived_wal(&self, wal: Option<&str>) -> &Self {
        self.catalog.lock().last_archived_wal = wal.map(str::to_string);
        self
    }

    /// Fail every statement built from `template` with `error`.
    pub fn fail_on(&self, template: &'static str, error: SessionError) -> &Self {
        self.catalog.lock().failures.insert(template, error);
        self
    }

    pub fn fail_connect(&self, error: SessionError) -> &Self {
        self.catalog.lock().connect_failure = Some(error);
        self
    }

    pub fn clear_failures(&self) -> &Self {
        let mut catalog = self.catalog.lock();
        catalog.failures.clear();
        catalog.connect_failure = None;
        drop(catalog);
        self
    }

    /// Simulate a concurrent request creating `database` between this
    /// request's existence check and its `CREATE DATABASE`.
    pub fn race_database_creation(&self, database: &str) -> &Self {
        self.catalog.lock().racing_databases.insert(database.to_string());
        self
    }

    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.catalog.lock().statements.clone()
    }

    pub fn templates(&self) -> Vec<&'static str> {
        self.catalog
            .lock()
            .statements
            .iter()
            .map(|recorded| recorded.statement.template())
            .collect()
    }

    pub fn clear_statements(&self) -> &Self {
        self.catalog.lock().statements.clear();
        self
    }

    pub fn role_exists(&self, name: &str) -> bool {
        self.catalog.lock().roles.contains(name)
    }

    pub fn is_member(&self, group: &str, member: &str) -> bool {
        self.catalog
            .lock()
            .memberships
            .contains(&(group.to_string(), member.to_string()))
    }

    pub fn database_exists(&self, name: &str) -> bool {
        self.catalog.lock().databases.contains(name)
    }

    pub fn extensions(&self, database: &str) -> BTreeSet<String> {
        self.catalog
            .lock()
            .extensions
            .get(database)
            .cloned()
            .unwrap_or_default()
    }

    pub fn system_setting(&self, name: &str) -> Option<String> {
        self.catalog.lock().system_settings.get(name).cloned()
    }

    pub fn reload_count(&self) -> usize {
        self.catalog.lock().reloads
    }

    /// Sessions opened and not yet closed or dropped.
    pub fn open_sessions(&self) -> usize {
        self.catalog.lock().open_sessions
    }

    pub fn sessions_opened(&self) -> usize {
        self.catalog.lock().sessions_opened
    }
}

#[async_trait]
impl SessionFactory for InMemoryPostgreSql {
    async fn open(
        &self,
        descriptor: &ConnectionDescriptor,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn PostgreSqlSession>, SessionError> {
        let (host, database) = descriptor.resolve(target);
        let mut catalog = self.catalog.lock();

        if let Some(error) = catalog.connect_failure.clone() {
            return Err(error);
        }
        if !catalog.databases.contains(database) {
            return Err(SessionError::Connect {
                host: host.to_string(),
                database: database.to_string(),
                message: format!("database \"{database}\" does not exist"),
            });
        }

        catalog.open_sessions += 1;
        catalog.sessions_opened += 1;
        Ok(Box::new(InMemorySession {
            catalog: Arc::clone(&self.catalog),
            database: database.to_string(),
        }))
    }
}

pub struct InMemorySession {
    catalog: Arc<Mutex<Catalog>>,
    database: String,
}

impl InMemorySession {
    fn run(&self, statement: &Statement) -> Result<Vec<SqlRow>, SessionError> {
        statement.render()?;

        let mut catalog = self.catalog.lock();
        catalog.statements.push(RecordedStatement {
            database: self.database.clone(),
            statement: statement.clone(),
        });
        if let Some(error) = catalog.failures.get(statement.template()) {
            return Err(error.clone());
        }

        let first = statement.fragment_value(0).unwrap_or_default().to_string();
        match statement.template() {
            queries::ROLE_EXISTS => Ok(flag_row(catalog.roles.contains(&first))),
            queries::CREATE_ROLE_NOLOGIN => {
                if !catalog.roles.insert(first.clone()) {
                    return Err(SessionError::statement(
                        Some(sqlstate::DUPLICATE_OBJECT),
                        format!("role \"{first}\" already exists"),
                    ));
                }
                Ok(Vec::new())
            }
            queries::GRANT_ROLE => {
                let member = statement.fragment_value(1).unwrap_or_default().to_string();
                for role in [&first, &member] {
                    if !catalog.roles.contains(role) {
                        return Err(SessionError::statement(
                            Some(UNDEFINED_OBJECT),
                            format!("role \"{role}\" does not exist"),
                        ));
                    }
                }
                catalog.memberships.insert((first, member));
                Ok(Vec::new())
            }
            queries::RELATION_USERS => Ok(catalog
                .login_users
                .iter()
                .filter(|user| is_relation_user(user))
                .map(|user| SqlRow::single(user.as_str()))
                .collect()),
            queries::DATABASE_EXISTS => {
                if catalog.racing_databases.remove(&first) {
                    catalog.databases.insert(first);
                    return Ok(Vec::new());
                }
                Ok(if catalog.databases.contains(&first) {
                    vec![SqlRow::single(first)]
                } else {
                    Vec::new()
                })
            }
            queries::CREATE_DATABASE => {
                if !catalog.databases.insert(first.clone()) {
                    return Err(SessionError::statement(
                        Some(sqlstate::DUPLICATE_DATABASE),
                        format!("database \"{first}\" already exists"),
                    ));
                }
                Ok(Vec::new())
            }
            queries::REVOKE_DATABASE_FROM_PUBLIC => {
                if !catalog.databases.contains(&first) {
                    return Err(SessionError::statement(
                        Some(INVALID_CATALOG_NAME),
                        format!("database \"{first}\" does not exist"),
                    ));
                }
                Ok(Vec::new())
            }
            queries::LIST_DATABASES => Ok(catalog
                .databases
                .iter()
                .map(|database| SqlRow::single(database.as_str()))
                .collect()),
            queries::CREATE_EXTENSION => {
                catalog
                    .extensions
                    .entry(self.database.clone())
                    .or_default()
                    .insert(first);
                Ok(Vec::new())
            }
            queries::DROP_EXTENSION => {
                if let Some(installed) = catalog.extensions.get_mut(&self.database) {
                    installed.remove(&first);
                }
                Ok(Vec::new())
            }
            queries::RELOAD_CONF => {
                catalog.reloads += 1;
                Ok(flag_row(true))
            }
            queries::LAST_ARCHIVED_WAL => Ok(vec![SqlRow::new(vec![catalog.last_archived_wal.clone()])]),
            template => match system_setting_change(template) {
                Some((name, Some(value))) => {
                    catalog.system_settings.insert(name.to_string(), value.to_string());
                    Ok(Vec::new())
                }
                Some((name, None)) => {
                    catalog.system_settings.remove(name);
                    Ok(Vec::new())
                }
                None => Err(SessionError::statement(
                    None,
                    format!("unsupported statement: {template}"),
                )),
            },
        }
    }
}

#[async_trait]
impl PostgreSqlSession for InMemorySession {
    async fn execute(&mut self, statement: &Statement) -> Result<u64, SessionError> {
        self.run(statement).map(|rows| rows.len() as u64)
    }

    async fn fetch_optional(&mut self, statement: &Statement) -> Result<Option<SqlRow>, SessionError> {
        Ok(self.run(statement)?.into_iter().next())
    }

    async fn fetch_all(&mut self, statement: &Statement) -> Result<Vec<SqlRow>, SessionError> {
        self.run(statement)
    }

    async fn close(self: Box<Self>) -> Result<(), SessionError> {
        Ok(())
    }
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        let mut catalog = self.catalog.lock();
        catalog.open_sessions = catalog.open_sessions.saturating_sub(1);
    }
}

fn flag_row(present: bool) -> Vec<SqlRow> {
    if present {
        vec![SqlRow::single("t")]
    } else {
        Vec::new()
    }
}

/// `ALTER SYSTEM` templates as (setting, new value); `None` means reset.
fn system_setting_change(template: &str) -> Option<(&'static str, Option<&'static str>)> {
    match template {
        queries::PGAUDIT_SET_LOG => Some(("pgaudit.log", Some("ROLE,DDL,MISC,MISC_SET"))),
        queries::PGAUDIT_SET_LOG_CLIENT => Some(("pgaudit.log_client", Some("off"))),
        queries::PGAUDIT_SET_LOG_PARAMETER => Some(("pgaudit.log_parameter", Some("off"))),
        queries::PGAUDIT_RESET_LOG => Some(("pgaudit.log", None)),
        queries::PGAUDIT_RESET_LOG_CLIENT => Some(("pgaudit.log_client", None)),
        queries::PGAUDIT_RESET_LOG_PARAMETER => Some(("pgaudit.log_parameter", None)),
        _ => None,
    }
}
