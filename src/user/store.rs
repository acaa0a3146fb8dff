//! Identity store seam and its implementations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::Postgres as PostgresConfig;
use crate::error::{Result, ServerError};
use crate::user::User;

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "registrar";
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Persistence seam owning [`User`] records.
///
/// Username uniqueness is this store's constraint. Callers perform no
/// locking and observe a violation as [`ServerError::Constraint`].
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Canonicalize an email address before storage.
    ///
    /// Surrounding whitespace is trimmed and the domain part after the
    /// last `@` is lowercased. The local part is preserved as given.
    fn normalize_email(&self, email: &str) -> String {
        let email = email.trim();
        match email.rsplit_once('@') {
            Some((local, domain)) => {
                format!("{local}@{}", domain.to_lowercase())
            },
            None => email.to_string(),
        }
    }

    /// Persist a new [`User`].
    async fn insert(&self, user: &User) -> Result<()>;

    /// Find a user by their natural key.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
}

/// PostgreSQL-backed identity store.
#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    /// Create a new [`PgIdentityStore`] over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Init database connection from configuration.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let username =
            config.username.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
        let password =
            config.password.as_deref().unwrap_or(DEFAULT_CREDENTIALS);
        let database =
            config.database.as_deref().unwrap_or(DEFAULT_DATABASE_NAME);

        let addr = format!(
            "postgres://{username}:{password}@{}/{database}",
            config.address
        );
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size.unwrap_or(DEFAULT_POOL_SIZE))
            .connect(&addr)
            .await?;

        tracing::info!(hostname = %config.address, %database, "postgres connected");

        Ok(Self { pool })
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn insert(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO users
                (username, email, profile_pic, bio, is_staff, is_active, is_superuser, password, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.profile_pic)
        .bind(&user.bio)
        .bind(user.is_staff)
        .bind(user.is_active)
        .bind(user.is_superuser)
        .bind(&user.password)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|err| match err.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                ServerError::Constraint { field: "username" }
            },
            _ => ServerError::Sql(err),
        })?;

        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"SELECT username, email, profile_pic, bio, is_staff, is_active, is_superuser, password, created_at
                FROM users WHERE username = $1"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

/// In-process identity store backed by a [`HashMap`].
///
/// Enforces the same username uniqueness as [`PgIdentityStore`]. Meant
/// for tests and local experimentation; nothing survives the process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    users: Arc<Mutex<HashMap<String, User>>>,
}

impl MemoryStore {
    /// Create a new empty [`MemoryStore`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted users.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no user has been persisted yet.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Fetch a persisted user by username.
    pub fn get(&self, username: &str) -> Option<User> {
        self.lock().get(username).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, User>> {
        self.users.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn insert(&self, user: &User) -> Result<()> {
        let mut users = self.lock();
        if users.contains_key(&user.username) {
            return Err(ServerError::Constraint { field: "username" });
        }
        users.insert(user.username.clone(), user.clone());

        Ok(())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.get(username))
    }
}
