//! libSQL backend: async `Database` and local `IdentityProvider`.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use argon2::Argon2;
use argon2::password_hash::{PasswordHasher, SaltString, rand_core::OsRng};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::accounts::{Account, IdentityProvider};
use crate::error::{AccountError, DatabaseError};
use crate::matching::{DateRange, Listing, ListingKind};
use crate::onboarding::ProfileSnapshot;
use crate::store::migrations;
use crate::store::traits::{Database, StoredProfile};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn email_registered(&self, email: &str) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM accounts WHERE email = ?1",
                params![email],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("email_registered: {e}")))?;
        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0) > 0),
            Ok(None) => Ok(false),
            Err(e) => Err(DatabaseError::Query(format!("email_registered row: {e}"))),
        }
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_date(s: &str, column: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DatabaseError::Serialization(format!("{column}: {e}")))
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Convert `Option<String>` to libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn is_unique_violation(e: &libsql::Error) -> bool {
    e.to_string().contains("UNIQUE constraint failed")
}

/// Hash a password with argon2id and a random salt.
fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AccountError::Other(format!("Failed to hash password: {e}")))
}

fn row_to_profile(row: &libsql::Row) -> Result<StoredProfile, DatabaseError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("profile.account_id: {e}")))?;
    let account_id = Uuid::parse_str(&id_str)
        .map_err(|e| DatabaseError::Serialization(format!("profile.account_id parse: {e}")))?;

    let payload: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("profile.payload: {e}")))?;
    let profile: ProfileSnapshot = serde_json::from_str(&payload)
        .map_err(|e| DatabaseError::Serialization(format!("profile.payload parse: {e}")))?;

    let created_str: String = row.get(2).unwrap_or_default();
    let updated_str: String = row.get(3).unwrap_or_default();

    Ok(StoredProfile {
        account_id,
        profile,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

fn row_to_listing(row: &libsql::Row) -> Result<Listing, DatabaseError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("listing.id: {e}")))?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| DatabaseError::Serialization(format!("listing.id parse: {e}")))?;

    let kind_str: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("listing.kind: {e}")))?;
    let kind: ListingKind = kind_str.parse().map_err(DatabaseError::Serialization)?;

    let title: String = row.get(2).unwrap_or_default();
    let city: String = row.get(3).unwrap_or_default();
    let university: Option<String> = row.get(4).ok();

    let start_str: String = row
        .get(5)
        .map_err(|e| DatabaseError::Query(format!("listing.start_date: {e}")))?;
    let end_str: String = row
        .get(6)
        .map_err(|e| DatabaseError::Query(format!("listing.end_date: {e}")))?;
    let available = DateRange::new(
        parse_date(&start_str, "listing.start_date")?,
        parse_date(&end_str, "listing.end_date")?,
    )
    .map_err(|e| DatabaseError::Serialization(format!("listing dates: {e}")))?;

    let monthly_rent = row
        .get::<i64>(7)
        .ok()
        .and_then(|r| u32::try_from(r).ok());
    let description: String = row.get(8).unwrap_or_default();
    let photos_str: String = row.get(9).unwrap_or_else(|_| "[]".to_string());
    let photos: Vec<String> = serde_json::from_str(&photos_str).unwrap_or_default();
    let owner_id = row
        .get::<String>(10)
        .ok()
        .and_then(|s| Uuid::parse_str(&s).ok());
    let created_str: String = row.get(11).unwrap_or_default();

    Ok(Listing {
        id,
        kind,
        title,
        city,
        university,
        available,
        monthly_rent,
        description,
        photos,
        owner_id,
        created_at: parse_datetime(&created_str),
    })
}

// ── Trait implementations ───────────────────────────────────────────

const PROFILE_COLUMNS: &str = "account_id, payload, created_at, updated_at";

const LISTING_COLUMNS: &str = "id, kind, title, city, university, start_date, end_date, monthly_rent, description, photos, owner_id, created_at";

#[async_trait]
impl Database for LibSqlBackend {
    // ── Profiles ────────────────────────────────────────────────────

    async fn save_profile(
        &self,
        account_id: Uuid,
        profile: &ProfileSnapshot,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let payload = serde_json::to_string(profile)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        conn.execute(
            "INSERT INTO profiles (account_id, email, start_date, end_date, payload, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT (account_id) DO UPDATE SET
                email = ?2, start_date = ?3, end_date = ?4, payload = ?5, updated_at = ?6",
            params![
                account_id.to_string(),
                profile.email.as_str(),
                opt_text_owned(profile.start_date.map(|d| d.to_string())),
                opt_text_owned(profile.end_date.map(|d| d.to_string())),
                payload,
                now,
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("save_profile: {e}")))?;

        debug!(account_id = %account_id, "Profile saved");
        Ok(())
    }

    async fn get_profile(&self, account_id: Uuid) -> Result<Option<StoredProfile>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE account_id = ?1"),
                params![account_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_profile(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile row: {e}"))),
        }
    }

    // ── Listings ────────────────────────────────────────────────────

    async fn insert_listing(&self, listing: &Listing) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let photos = serde_json::to_string(&listing.photos)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        let monthly_rent = match listing.monthly_rent {
            Some(rent) => libsql::Value::Integer(i64::from(rent)),
            None => libsql::Value::Null,
        };

        conn.execute(
            &format!(
                "INSERT INTO listings ({LISTING_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            params![
                listing.id.to_string(),
                listing.kind.as_str(),
                listing.title.as_str(),
                listing.city.as_str(),
                opt_text(listing.university.as_deref()),
                listing.available.start().to_string(),
                listing.available.end().to_string(),
                monthly_rent,
                listing.description.as_str(),
                photos,
                opt_text_owned(listing.owner_id.map(|id| id.to_string())),
                listing.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DatabaseError::Constraint(format!("listing {} already exists", listing.id))
            } else {
                DatabaseError::Query(format!("insert_listing: {e}"))
            }
        })?;

        debug!(listing_id = %listing.id, kind = %listing.kind, "Listing inserted");
        Ok(())
    }

    async fn get_listing(&self, id: Uuid) -> Result<Option<Listing>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_listing: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_listing(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_listing row: {e}"))),
        }
    }

    async fn list_listings(&self, kind: Option<ListingKind>) -> Result<Vec<Listing>, DatabaseError> {
        let conn = self.conn();
        let mut rows = match kind {
            Some(kind) => conn
                .query(
                    &format!(
                        "SELECT {LISTING_COLUMNS} FROM listings WHERE kind = ?1 ORDER BY created_at DESC"
                    ),
                    params![kind.as_str()],
                )
                .await,
            None => conn
                .query(
                    &format!("SELECT {LISTING_COLUMNS} FROM listings ORDER BY created_at DESC"),
                    (),
                )
                .await,
        }
        .map_err(|e| DatabaseError::Query(format!("list_listings: {e}")))?;

        let mut listings = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_listings: {e}")))?
        {
            match row_to_listing(&row) {
                Ok(listing) => listings.push(listing),
                Err(e) => {
                    warn!("Skipping listing row: {e}");
                }
            }
        }
        Ok(listings)
    }
}

#[async_trait]
impl IdentityProvider for LibSqlBackend {
    async fn create_account(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Account, AccountError> {
        let email = email.trim();
        let registered = self
            .email_registered(email)
            .await
            .map_err(|e| AccountError::Other(e.to_string()))?;
        if registered {
            return Err(AccountError::AlreadyRegistered);
        }

        let password = password.expose_secret().to_string();
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AccountError::Other(format!("Password hashing task failed: {e}")))??;

        let id = Uuid::new_v4();
        self.conn()
            .execute(
                "INSERT INTO accounts (id, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id.to_string(), email, password_hash, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AccountError::AlreadyRegistered
                } else {
                    AccountError::Other(format!("create_account: {e}"))
                }
            })?;

        info!(account_id = %id, "Local account created");
        Ok(Account {
            id,
            email: email.to_string(),
        })
    }
}
