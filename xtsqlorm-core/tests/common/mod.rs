//! Shared fixture: a temp-dir SQLite database with `users`, `audit_logs` and `posts`
#![allow(dead_code)]

use serde::Serialize;
use tempfile::TempDir;
use xtsqlorm::{
    blocking, create_table, ColumnInfo, ColumnType, ConnectionManager, EngineOptions, Model,
    SessionProvider, TableShape,
};

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub age: Option<i64>,
}

impl Model for User {
    fn table() -> TableShape {
        TableShape::new(
            "users",
            vec![
                ColumnInfo::id("id"),
                ColumnInfo::new("username", ColumnType::Text).not_null(),
                ColumnInfo::new("email", ColumnType::Text),
                ColumnInfo::new("age", ColumnType::Integer),
            ],
        )
        .expect("users shape")
    }
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AuditLog {
    pub id: i64,
    pub user_id: i64,
    pub action: String,
}

impl Model for AuditLog {
    fn table() -> TableShape {
        TableShape::new(
            "audit_logs",
            vec![
                ColumnInfo::id("id"),
                ColumnInfo::new("user_id", ColumnType::Integer).not_null(),
                ColumnInfo::new("action", ColumnType::Text).not_null(),
            ],
        )
        .expect("audit_logs shape")
    }
}

/// Timestamped, soft-deletable and versioned
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
    pub version: i64,
}

impl Model for Post {
    fn table() -> TableShape {
        TableShape::new(
            "posts",
            vec![
                ColumnInfo::id("id"),
                ColumnInfo::new("title", ColumnType::Text).not_null(),
                ColumnInfo::new("created_at", ColumnType::Text),
                ColumnInfo::new("updated_at", ColumnType::Text),
                ColumnInfo::new("deleted_at", ColumnType::Text),
                ColumnInfo::new("version", ColumnType::Integer).not_null(),
            ],
        )
        .and_then(|shape| shape.with_timestamps("created_at", "updated_at"))
        .and_then(|shape| shape.with_soft_delete("deleted_at"))
        .and_then(|shape| shape.with_version("version"))
        .expect("posts shape")
    }
}

pub struct Fixture {
    pub manager: ConnectionManager,
    pub provider: SessionProvider,
    // Dropped last: holds the database file
    pub dir: TempDir,
}

pub fn database_url(dir: &TempDir) -> String {
    format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display())
}

pub async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let manager = ConnectionManager::connect(EngineOptions::from_url(database_url(&dir)))
        .await
        .unwrap();
    create_table(&manager, &User::table(), false).await.unwrap();
    create_table(&manager, &AuditLog::table(), false).await.unwrap();
    create_table(&manager, &Post::table(), false).await.unwrap();

    let provider = SessionProvider::new(manager.clone());
    Fixture {
        manager,
        provider,
        dir,
    }
}

pub struct BlockingFixture {
    pub manager: blocking::ConnectionManager,
    pub provider: blocking::SessionProvider,
    pub dir: TempDir,
}

pub fn blocking_fixture() -> BlockingFixture {
    let dir = tempfile::tempdir().unwrap();
    let manager =
        blocking::create_connection_manager(EngineOptions::from_url(database_url(&dir))).unwrap();
    blocking::create_table(&manager, &User::table(), false).unwrap();
    blocking::create_table(&manager, &AuditLog::table(), false).unwrap();
    blocking::create_table(&manager, &Post::table(), false).unwrap();

    let provider = blocking::create_session_provider(&manager);
    BlockingFixture {
        manager,
        provider,
        dir,
    }
}
