//! Embedded PostgreSQL databases for repository integration tests.
//!
//! One cluster is shared per test binary. A template database carrying the
//! embedded Diesel migrations is created once per migration hash, and each
//! test clones it, so suites never drift from `backend/migrations`.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use city_boundaries::domain::ports::BoundaryRepositoryError;
use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use pg_embedded_setup_unpriv::test_support::hash_directory;
use pg_embedded_setup_unpriv::{BootstrapResult, ClusterHandle, TemporaryDatabase};
use uuid::Uuid;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

static TEMPLATE_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const TEMPLATE_NAME_PREFIX: &str = "boundaries_template";
const PROVISION_RETRIES: usize = 5;
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// The cluster shared by every test in this binary.
///
/// `PG_PASSWORD` is pinned first: a reused data directory keeps the password
/// it was initialised with.
pub fn shared_cluster_handle() -> BootstrapResult<&'static ClusterHandle> {
    if std::env::var_os("PG_PASSWORD").is_none() {
        // SAFETY: runs before the library starts any threads; the shared
        // cluster singleton serialises the first bootstrap.
        unsafe {
            std::env::set_var("PG_PASSWORD", "boundaries_embedded_test");
        }
    }
    let mut attempt = 1;
    loop {
        match pg_embedded_setup_unpriv::test_support::shared_cluster_handle() {
            Ok(handle) => return Ok(handle),
            Err(error) if attempt >= PROVISION_RETRIES => return Err(error),
            Err(_) => {
                std::thread::sleep(RETRY_DELAY);
                attempt += 1;
            }
        }
    }
}

fn migrations_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations")
}

fn template_database_name() -> Result<String, BoundaryRepositoryError> {
    let hash = hash_directory(migrations_dir())
        .map_err(|err| BoundaryRepositoryError::query(format!("hash migrations: {err}")))?;
    let short_hash = hash.get(..8).unwrap_or(&hash);
    Ok(format!("{TEMPLATE_NAME_PREFIX}_{short_hash}"))
}

fn ensure_template_database(cluster: &ClusterHandle) -> Result<String, BoundaryRepositoryError> {
    let template_name = template_database_name()?;
    let _lock = TEMPLATE_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|err| err.into_inner());

    let exists = cluster
        .database_exists(template_name.as_str())
        .map_err(|err| BoundaryRepositoryError::query(format!("template check: {err:?}")))?;
    if !exists {
        cluster
            .create_database(template_name.as_str())
            .map_err(|err| BoundaryRepositoryError::query(format!("create template: {err:?}")))?;
        let url = cluster.connection().database_url(&template_name);
        migrate_schema(&url)?;
    }

    Ok(template_name)
}

/// A fresh database cloned from the migrated template.
pub fn provision_template_database(
    cluster: &ClusterHandle,
) -> Result<TemporaryDatabase, BoundaryRepositoryError> {
    let mut last_error = None;
    for attempt in 1..=PROVISION_RETRIES {
        let provisioned = ensure_template_database(cluster).and_then(|template_name| {
            let db_name = format!("test_{}", Uuid::new_v4());
            cluster
                .temporary_database_from_template(db_name.as_str(), template_name.as_str())
                .map_err(|err| {
                    BoundaryRepositoryError::query(format!(
                        "create database from template: attempt {attempt}/{PROVISION_RETRIES}: {err:?}"
                    ))
                })
        });
        match provisioned {
            Ok(database) => return Ok(database),
            Err(error) => last_error = Some(error),
        }
        if attempt < PROVISION_RETRIES {
            std::thread::sleep(RETRY_DELAY);
        }
    }

    Err(last_error.unwrap_or_else(|| {
        BoundaryRepositoryError::query("create database from template: exhausted retries")
    }))
}

/// Run every pending migration against `url`.
pub fn migrate_schema(url: &str) -> Result<(), BoundaryRepositoryError> {
    let mut conn = PgConnection::establish(url)
        .map_err(|err| BoundaryRepositoryError::connection(format!("{err:?}")))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| BoundaryRepositoryError::query(format!("migration: {err:?}")))?;
    Ok(())
}
