use chrono::{DateTime, NaiveDate, Utc};
use rust_orm::{
    Entity, Identity, OrmError, Repository, SqliteConfig, SqliteConnectionProvider,
};
use rusqlite::Connection;
use std::sync::Arc;
use tempfile::NamedTempFile;

rust_orm::entity! {
    #[table = "customer"]
    pub struct Customer {
        #[column = "full_name"]
        pub name: String,
        #[column = "email_addr"]
        pub email: String,
        #[column = "age"]
        pub age: Option<i32>,
        #[column = "joined_at"]
        pub joined_at: DateTime<Utc>,
        #[column = "score"]
        pub score: f64,
        #[column = "active"]
        pub active: bool,
    }
}

type CustomerRepo = Repository<Customer, SqliteConnectionProvider>;

// Initialize the database schema
fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE customer (
            customer_id INTEGER PRIMARY KEY AUTOINCREMENT,
            full_name TEXT NOT NULL,
            email_addr TEXT UNIQUE NOT NULL,
            age INTEGER,
            joined_at TEXT NOT NULL,
            score REAL NOT NULL,
            active INTEGER NOT NULL
        );
        CREATE INDEX idx_customer_email ON customer(email_addr);
        "#,
    )
}

// Helper function to create a temporary file-based database and a repository on it
fn create_temp_repo() -> anyhow::Result<(CustomerRepo, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let path = temp_file.path().to_string_lossy().into_owned();
    initialize_schema(&Connection::open(&path)?)?;
    let provider = SqliteConnectionProvider::new(SqliteConfig::new(path))?;
    Ok((Repository::new(provider)?, temp_file))
}

fn customer(name: &str, email: &str) -> Customer {
    Customer {
        name: name.to_string(),
        email: email.to_string(),
        age: Some(30),
        joined_at: NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_milli_opt(12, 30, 0, 123)
            .unwrap()
            .and_utc(),
        score: 4.75,
        active: true,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_basic_operations() {
    test_basic_operations_impl().unwrap();
}

fn test_basic_operations_impl() -> anyhow::Result<()> {
    let (repo, _file) = create_temp_repo()?;

    // Insert a new customer
    let john = customer("John Doe", "john@example.com");
    let id = repo.add(&john)?;
    assert!(id > 0);
    assert!(!john.identity().is_set());

    // Fetch it back
    let stored = repo.fetch_by_id(id)?.expect("customer should exist");
    assert_eq!(stored.identity().get(), Some(id));
    assert_eq!(stored.name, "John Doe");
    assert_eq!(stored.email, "john@example.com");
    assert_eq!(stored.age, Some(30));
    assert_eq!(stored.joined_at, john.joined_at);
    assert_eq!(stored.score, 4.75);
    assert!(stored.active);

    // Update the customer
    let mut changed = stored.clone();
    changed.age = None;
    changed.active = false;
    repo.update(&changed)?;
    let updated = repo.fetch_by_id(id)?.expect("customer should still exist");
    assert_eq!(updated.age, None);
    assert!(!updated.active);
    assert_eq!(updated, stored);

    // Delete the customer
    repo.delete(id)?;
    assert!(repo.fetch_by_id(id)?.is_none());

    Ok(())
}

#[test]
fn test_list_assigns_identities() -> anyhow::Result<()> {
    let (repo, _file) = create_temp_repo()?;
    let first = repo.add(&customer("Ann", "ann@example.com"))?;
    let second = repo.add(&customer("Bob", "bob@example.com"))?;

    let mut all = repo.list()?;
    all.sort_by_key(|c| c.identity().get());
    let ids: Vec<_> = all.iter().map(|c| c.identity().get()).collect();
    assert_eq!(ids, vec![Some(first), Some(second)]);
    assert_eq!(all[0].name, "Ann");
    assert_eq!(all[1].email, "bob@example.com");
    Ok(())
}

#[test]
fn test_assigning_generated_id_is_explicit() -> anyhow::Result<()> {
    let (repo, _file) = create_temp_repo()?;
    let mut ann = customer("Ann", "ann@example.com");
    let id = repo.add(&ann)?;
    *ann.identity_mut() = Identity::from(id);

    ann.name = "Ann Smith".into();
    repo.update(&ann)?;
    assert_eq!(repo.fetch_by_id(id)?.map(|c| c.name), Some("Ann Smith".into()));
    Ok(())
}

#[test]
fn test_update_without_identity_is_configuration_error() -> anyhow::Result<()> {
    let (repo, _file) = create_temp_repo()?;
    let err = repo.update(&customer("Ann", "ann@example.com")).unwrap_err();
    assert!(matches!(err, OrmError::Configuration(_)));
    assert!(repo.list()?.is_empty());
    Ok(())
}

#[test]
fn test_constraint_violation_is_data_access_error() -> anyhow::Result<()> {
    let (repo, _file) = create_temp_repo()?;
    repo.add(&customer("Ann", "same@example.com"))?;
    let err = repo.add(&customer("Other", "same@example.com")).unwrap_err();
    assert!(matches!(err, OrmError::DataAccess(_)));
    assert!(std::error::Error::source(&err).is_some());
    assert_eq!(repo.list()?.len(), 1);
    Ok(())
}

#[test]
fn test_missing_table_is_data_access_error() -> anyhow::Result<()> {
    let temp_file = NamedTempFile::new()?;
    let provider = SqliteConnectionProvider::new(SqliteConfig::new(
        temp_file.path().to_string_lossy(),
    ))?;
    let repo: CustomerRepo = Repository::new(provider)?;
    assert!(matches!(repo.list(), Err(OrmError::DataAccess(_))));
    assert!(matches!(repo.fetch_by_id(1), Err(OrmError::DataAccess(_))));
    Ok(())
}

#[test]
fn test_invalid_utf8_text_is_conversion_error() -> anyhow::Result<()> {
    let (repo, file) = create_temp_repo()?;
    Connection::open(file.path())?.execute_batch(
        "INSERT INTO customer (customer_id, full_name, email_addr, joined_at, score, active) \
         VALUES (1, CAST(X'61FF62' AS TEXT), 'ab@example.com', '2024-05-01 12:30:00', 1.0, 1);",
    )?;

    let err = repo.fetch_by_id(1).unwrap_err();
    assert!(matches!(err, OrmError::Conversion { ref column, .. } if column == "full_name"));
    Ok(())
}

#[test]
fn test_config_from_json_with_init_sql()-> anyhow::Result<()> {
    let temp_file = NamedTempFile::new()?;
    let json = serde_json::json!({
        "db_path": temp_file.path().to_string_lossy(),
        "init_sql": "CREATE TABLE customer (customer_id INTEGER PRIMARY KEY, full_name TEXT, \
                     email_addr TEXT, age INTEGER, joined_at TEXT, score REAL, active INTEGER);",
    });
    let config: SqliteConfig = serde_json::from_value(json)?;
    assert_eq!(config.busy_timeout_ms, 5_000);
    assert!(config.foreign_keys);

    let repo: CustomerRepo = Repository::new(SqliteConnectionProvider::new(config)?)?;
    let id = repo.add(&customer("Ann", "ann@example.com"))?;
    assert!(repo.fetch_by_id(id)?.is_some());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_use_separate_connections() -> anyhow::Result<()> {
    let (repo, _file) = create_temp_repo()?;
    let repo = Arc::new(repo);

    let mut handles = Vec::new();
    for i in 0..8 {
        let repo = Arc::clone(&repo);
        handles.push(tokio::task::spawn_blocking(move || {
            repo.add(&customer(&format!("user {i}"), &format!("user{i}@example.com")))
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await??);
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(repo.list()?.len(), 8);
    Ok(())
}
