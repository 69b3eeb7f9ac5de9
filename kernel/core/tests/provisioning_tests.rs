// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Database provisioning and extension reconciliation.
//!
//! The key properties: a failed create never leaves extensions enabled, a
//! second request for the same database only re-revokes public access and
//! reconciles extensions, and a lost creation race is treated as "already
//! exists".

use kernel_postgresql_core::domain::sql::queries;
use kernel_postgresql_core::infrastructure::InMemoryPostgreSql;
use kernel_postgresql_core::{ConnectionDescriptor, PostgreSql, PostgreSqlError, SessionError, Statement};
use std::collections::BTreeMap;
use std::sync::Arc;

fn setup() -> (InMemoryPostgreSql, PostgreSql) {
    let server = InMemoryPostgreSql::new();
    let descriptor = ConnectionDescriptor::new("10.1.1.1", "10.1.1.2", "operator", "secret", "postgres");
    let postgresql = PostgreSql::new(descriptor, Arc::new(server.clone()));
    (server, postgresql)
}

const PLUGINS: [&str; 2] = ["test_plugin_1", "test_plugin_2"];

#[tokio::test]
async fn test_create_database() {
    let (server, postgresql) = setup();

    postgresql.create_database("test_database", PLUGINS).await.unwrap();

    let executed = server.statements();
    assert_eq!(
        executed[0].statement,
        Statement::new(queries::DATABASE_EXISTS).literal("test_database")
    );
    assert_eq!(
        executed[1].statement,
        Statement::new(queries::CREATE_DATABASE).identifier("test_database")
    );
    assert_eq!(
        executed[2].statement,
        Statement::new(queries::REVOKE_DATABASE_FROM_PUBLIC).identifier("test_database")
    );

    // Extensions are enabled inside the new database.
    let extension_statements: Vec<_> = executed
        .iter()
        .filter(|r| r.statement.template() == queries::CREATE_EXTENSION)
        .collect();
    assert_eq!(extension_statements.len(), 2);
    assert!(extension_statements.iter().all(|r| r.database == "test_database"));

    assert!(server.database_exists("test_database"));
    assert_eq!(
        server.extensions("test_database").into_iter().collect::<Vec<_>>(),
        vec!["test_plugin_1".to_string(), "test_plugin_2".to_string()]
    );
    assert_eq!(server.open_sessions(), 0);
}

#[tokio::test]
async fn test_second_request_for_same_database_only_reconciles_extensions() {
    let (server, postgresql) = setup();
    postgresql.create_database("test_database", PLUGINS).await.unwrap();
    server.clear_statements();

    postgresql.create_database("test_database", PLUGINS).await.unwrap();

    let templates = server.templates();
    assert!(!templates.contains(&queries::CREATE_DATABASE));
    assert_eq!(
        templates,
        vec![
            queries::DATABASE_EXISTS,
            queries::REVOKE_DATABASE_FROM_PUBLIC,
            queries::CREATE_EXTENSION,
            queries::CREATE_EXTENSION,
        ]
    );
}

#[tokio::test]
async fn test_lost_creation_race_is_not_an_error() {
    let (server, postgresql) = setup();
    server.race_database_creation("test_database");

    postgresql.create_database("test_database", PLUGINS).await.unwrap();

    let templates = server.templates();
    assert_eq!(
        &templates[..3],
        &[
            queries::DATABASE_EXISTS,
            queries::CREATE_DATABASE,
            queries::REVOKE_DATABASE_FROM_PUBLIC,
        ]
    );
    assert_eq!(server.extensions("test_database").len(), 2);
}

#[tokio::test]
async fn test_retry_revokes_public_access_after_failed_revoke() {
    let (server, postgresql) = setup();
    server.fail_on(
        queries::REVOKE_DATABASE_FROM_PUBLIC,
        SessionError::statement(Some("57P01"), "terminating connection due to administrator command"),
    );

    let result = postgresql.create_database("app", ["pg_trgm"]).await;
    assert!(matches!(result, Err(PostgreSqlError::CreateDatabase { .. })));
    assert!(server.database_exists("app"));
    assert!(server.extensions("app").is_empty());

    server.clear_failures();
    server.clear_statements();
    postgresql.create_database("app", ["pg_trgm"]).await.unwrap();

    let executed: Vec<Statement> = server.statements().into_iter().map(|r| r.statement).collect();
    assert_eq!(
        executed,
        vec![
            Statement::new(queries::DATABASE_EXISTS).literal("app"),
            Statement::new(queries::REVOKE_DATABASE_FROM_PUBLIC).identifier("app"),
            Statement::new(queries::CREATE_EXTENSION).identifier("pg_trgm"),
        ]
    );
    assert_eq!(server.open_sessions(), 0);
}

#[tokio::test]
async fn test_failed_creation_never_enables_extensions() {
    let (server, postgresql) = setup();
    server.fail_on(queries::DATABASE_EXISTS, SessionError::statement(None, "connection reset"));

    let result = postgresql.create_database("test_database", PLUGINS).await;

    assert!(matches!(
        result,
        Err(PostgreSqlError::CreateDatabase { ref database, .. }) if database == "test_database"
    ));
    assert!(!server.templates().contains(&queries::CREATE_EXTENSION));
    assert_eq!(server.open_sessions(), 0);
}

#[tokio::test]
async fn test_failed_create_statement_never_enables_extensions() {
    let (server, postgresql) = setup();
    server.fail_on(queries::CREATE_DATABASE, SessionError::statement(Some("42501"), "permission denied"));

    let result = postgresql.create_database("test_database", PLUGINS).await;

    assert!(matches!(result, Err(PostgreSqlError::CreateDatabase { .. })));
    assert!(!server.templates().contains(&queries::CREATE_EXTENSION));
    assert!(server.extensions("test_database").is_empty());
}

#[tokio::test]
async fn test_connection_failure_is_a_create_database_error() {
    let (server, postgresql) = setup();
    server.fail_connect(SessionError::Connect {
        host: "10.1.1.1".to_string(),
        database: "postgres".to_string(),
        message: "refused".to_string(),
    });

    let result = postgresql.create_database("test_database", PLUGINS).await;
    assert!(matches!(result, Err(PostgreSqlError::CreateDatabase { .. })));
}

#[tokio::test]
async fn test_database_name_is_quoted() {
    let (server, postgresql) = setup();
    let hostile = r#"app"; DROP DATABASE postgres; --"#;

    postgresql.create_database(hostile, Vec::<String>::new()).await.unwrap();

    let create = &server.statements()[1].statement;
    assert_eq!(
        create.render().unwrap().sql,
        r#"CREATE DATABASE "app""; DROP DATABASE postgres; --";"#
    );
    assert!(server.database_exists(hostile));
    assert!(server.database_exists("postgres"));
}

#[tokio::test]
async fn test_database_exists() {
    let (server, postgresql) = setup();
    server.add_database("orders");

    assert!(postgresql.database_exists("orders").await.unwrap());
    assert!(!postgresql.database_exists("missing").await.unwrap());
}

#[tokio::test]
async fn test_enable_disable_extensions_in_all_databases() {
    let (server, postgresql) = setup();
    server.add_database("orders").add_database("billing");
    postgresql
        .enable_disable_extensions(&BTreeMap::from([("citext".to_string(), true)]), None)
        .await
        .unwrap();

    for database in ["postgres", "orders", "billing"] {
        assert!(server.extensions(database).contains("citext"), "{database}");
    }

    postgresql
        .enable_disable_extensions(&BTreeMap::from([("citext".to_string(), false)]), Some("orders"))
        .await
        .unwrap();
    assert!(!server.extensions("orders").contains("citext"));
    assert!(server.extensions("billing").contains("citext"));
}

#[tokio::test]
async fn test_enable_extension_race_is_ignored() {
    let (server, postgresql) = setup();
    server.fail_on(queries::CREATE_EXTENSION, SessionError::statement(Some("23505"), "duplicate key"));

    postgresql
        .enable_disable_extensions(&BTreeMap::from([("hstore".to_string(), true)]), Some("postgres"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_drop_extension_with_dependents() {
    let (server, postgresql) = setup();
    server.fail_on(
        queries::DROP_EXTENSION,
        SessionError::statement(Some("2BP01"), "other objects depend on it"),
    );

    let result = postgresql
        .enable_disable_extensions(&BTreeMap::from([("postgis".to_string(), false)]), Some("postgres"))
        .await;

    assert!(matches!(
        result,
        Err(PostgreSqlError::DependentObjectsStillExist { ref extension, .. }) if extension == "postgis"
    ));
    assert_eq!(server.open_sessions(), 0);
}

#[tokio::test]
async fn test_extension_failure_is_typed() {
    let (server, postgresql) = setup();
    server.fail_on(queries::CREATE_EXTENSION, SessionError::statement(Some("58P01"), "could not open extension control file"));

    let result = postgresql
        .enable_disable_extensions(&BTreeMap::from([("unknown".to_string(), true)]), Some("postgres"))
        .await;

    assert!(matches!(result, Err(PostgreSqlError::EnableDisableExtension(_))));
}

#[tokio::test]
async fn test_pgaudit_extension_toggles_audit_settings() {
    let (server, postgresql) = setup();

    postgresql.create_database("audited", ["pgaudit"]).await.unwrap();

    assert!(server.extensions("audited").contains("pgaudit"));
    assert_eq!(server.system_setting("pgaudit.log").as_deref(), Some("ROLE,DDL,MISC,MISC_SET"));
    assert_eq!(server.reload_count(), 1);
}
