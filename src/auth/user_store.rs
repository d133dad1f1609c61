//! User Storage
//! Mission: Persist users and their addresses in SQLite, hashing passwords on the way in

use crate::auth::models::{
    Address, AddressType, CreateUserRequest, Role, UpdateUserRequest, User,
};
use bcrypt::{hash, verify};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, phone, date_of_birth, cpf, role, created_at";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("e-mail already registered: {0}")]
    EmailTaken(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// User storage with SQLite backend.
///
/// Every call opens its own connection on the blocking pool, so the store is
/// cheap to clone and safe to share between requests.
#[derive(Debug, Clone)]
pub struct UserStore {
    db_path: PathBuf,
    hash_cost: u32,
}

impl UserStore {
    /// Create a new user store and initialize database
    pub fn new(db_path: impl AsRef<Path>, hash_cost: u32) -> Result<Self, StoreError> {
        let store = Self {
            db_path: db_path.as_ref().to_path_buf(),
            hash_cost,
        };
        store.init_db()?;
        Ok(store)
    }

    fn open(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    fn init_db(&self) -> Result<(), StoreError> {
        let conn = self.open()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                phone TEXT NOT NULL,
                date_of_birth TEXT NOT NULL,
                cpf TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS addresses (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                address TEXT NOT NULL,
                city TEXT NOT NULL,
                state TEXT NOT NULL,
                postal_code TEXT NOT NULL,
                country TEXT NOT NULL,
                type TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_addresses_user ON addresses(user_id);",
        )?;

        Ok(())
    }

    /// Runs blocking SQLite/bcrypt work off the async executor.
    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(UserStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(store)).await?
    }

    /// Seed an admin account when none exists. Returns whether one was created.
    pub fn ensure_admin(&self, email: &str, password: &str) -> Result<bool, StoreError> {
        let conn = self.open()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = ?1",
            params![Role::Admin.as_str()],
            |row| row.get(0),
        )?;

        if count > 0 {
            return Ok(false);
        }

        let admin = User {
            id: Uuid::new_v4(),
            name: "Administrator".to_string(),
            email: email.to_string(),
            password_hash: hash(password, self.hash_cost)?,
            phone: String::new(),
            date_of_birth: NaiveDate::default(),
            cpf: String::new(),
            role: Role::Admin,
            created_at: Utc::now().to_rfc3339(),
            addresses: Vec::new(),
        };
        insert_user(&conn, &admin)?;

        info!("🔐 Bootstrap admin created ({})", admin.email);
        Ok(true)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_string();
        self.blocking(move |store| {
            let conn = store.open()?;
            let user = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                    params![email],
                    user_from_row,
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    /// Lookup by id, addresses included
    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.blocking(move |store| {
            let conn = store.open()?;
            load_user(&conn, id)
        })
        .await
    }

    pub async fn find_all_users(&self) -> Result<Vec<User>, StoreError> {
        self.blocking(|store| {
            let conn = store.open()?;
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at"))?;
            let users = stmt
                .query_map([], user_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
        .await
    }

    /// Create a user together with its first address
    pub async fn create_user(&self, req: CreateUserRequest) -> Result<User, StoreError> {
        self.blocking(move |store| {
            let password_hash = hash(&req.password, store.hash_cost)?;
            let id = Uuid::new_v4();
            let address = Address {
                id: Uuid::new_v4(),
                user_id: id,
                address: req.address,
                city: req.city,
                state: req.state,
                postal_code: req.postal_code,
                country: req.country,
                kind: req.address_type,
            };
            let user = User {
                id,
                name: req.name,
                email: req.email,
                password_hash,
                phone: req.phone,
                date_of_birth: req.date_of_birth,
                cpf: req.cpf,
                role: req.role,
                created_at: Utc::now().to_rfc3339(),
                addresses: vec![address],
            };

            let mut conn = store.open()?;
            let tx = conn.transaction()?;
            insert_user(&tx, &user)?;
            insert_address(&tx, &user.addresses[0])?;
            tx.commit()?;

            info!("✅ Created user: {} ({})", user.email, user.role);
            Ok(user)
        })
        .await
    }

    /// Apply a partial update. `None` when the id is unknown.
    pub async fn update_user(
        &self,
        id: Uuid,
        req: UpdateUserRequest,
    ) -> Result<Option<User>, StoreError> {
        self.blocking(move |store| {
            let password_hash = match &req.password {
                Some(password) => Some(hash(password, store.hash_cost)?),
                None => None,
            };

            let mut conn = store.open()?;
            let tx = conn.transaction()?;

            let updated = tx
                .execute(
                    "UPDATE users SET
                        name = COALESCE(?2, name),
                        email = COALESCE(?3, email),
                        phone = COALESCE(?4, phone),
                        password_hash = COALESCE(?5, password_hash)
                     WHERE id = ?1",
                    params![id.to_string(), req.name, req.email, req.phone, password_hash],
                )
                .map_err(|e| unique_violation(e, req.email.as_deref()))?;

            if updated == 0 {
                return Ok(None);
            }

            if req.touches_address() {
                let existing: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM addresses WHERE user_id = ?1",
                    params![id.to_string()],
                    |row| row.get(0),
                )?;

                if existing > 0 {
                    tx.execute(
                        "UPDATE addresses SET
                            address = COALESCE(?2, address),
                            city = COALESCE(?3, city),
                            state = COALESCE(?4, state),
                            postal_code = COALESCE(?5, postal_code),
                            country = COALESCE(?6, country),
                            type = COALESCE(?7, type)
                         WHERE user_id = ?1",
                        params![
                            id.to_string(),
                            req.address,
                            req.city,
                            req.state,
                            req.postal_code,
                            req.country,
                            req.address_type.map(|t| t.as_str()),
                        ],
                    )?;
                } else {
                    let address = Address {
                        id: Uuid::new_v4(),
                        user_id: id,
                        address: req.address.clone().unwrap_or_default(),
                        city: req.city.clone().unwrap_or_default(),
                        state: req.state.clone().unwrap_or_default(),
                        postal_code: req.postal_code.clone().unwrap_or_default(),
                        country: req.country.clone().unwrap_or_default(),
                        kind: req.address_type.unwrap_or_default(),
                    };
                    insert_address(&tx, &address)?;
                    debug!("Created first address for user {}", id);
                }
            }

            let user = load_user(&tx, id)?;
            tx.commit()?;

            info!("✏️  Updated user: {}", id);
            Ok(user)
        })
        .await
    }

    /// Delete a user and its addresses, returning the removed record
    pub async fn delete_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.blocking(move |store| {
            let mut conn = store.open()?;
            let tx = conn.transaction()?;

            let Some(user) = load_user(&tx, id)? else {
                return Ok(None);
            };

            tx.execute(
                "DELETE FROM addresses WHERE user_id = ?1",
                params![id.to_string()],
            )?;
            tx.execute("DELETE FROM users WHERE id = ?1", params![id.to_string()])?;
            tx.commit()?;

            info!("🗑️  Deleted user: {}", id);
            Ok(Some(user))
        })
        .await
    }

    /// Constant-time bcrypt comparison against a stored hash
    pub async fn validate_password(
        &self,
        plain: &str,
        password_hash: &str,
    ) -> Result<bool, StoreError> {
        let plain = plain.to_string();
        let password_hash = password_hash.to_string();
        self.blocking(move |_| Ok(verify(plain, &password_hash)?))
            .await
    }
}

fn insert_user(conn: &Connection, user: &User) -> Result<(), StoreError> {
    conn.execute(
        &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
        params![
            user.id.to_string(),
            user.name,
            user.email,
            user.password_hash,
            user.phone,
            user.date_of_birth.to_string(),
            user.cpf,
            user.role.as_str(),
            user.created_at,
        ],
    )
    .map_err(|e| unique_violation(e, Some(&user.email)))?;
    Ok(())
}

fn insert_address(conn: &Connection, address: &Address) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO addresses (id, user_id, address, city, state, postal_code, country, type)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            address.id.to_string(),
            address.user_id.to_string(),
            address.address,
            address.city,
            address.state,
            address.postal_code,
            address.country,
            address.kind.as_str(),
        ],
    )?;
    Ok(())
}

fn load_user(conn: &Connection, id: Uuid) -> Result<Option<User>, StoreError> {
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id.to_string()],
            user_from_row,
        )
        .optional()?;

    let Some(mut user) = user else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT id, user_id, address, city, state, postal_code, country, type
         FROM addresses WHERE user_id = ?1",
    )?;
    user.addresses = stmt
        .query_map(params![id.to_string()], address_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(user))
}

fn unique_violation(err: rusqlite::Error, email: Option<&str>) -> StoreError {
    match (&err, email) {
        (rusqlite::Error::SqliteFailure(e, _), Some(email))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            warn!("Rejected duplicate e-mail {}", email);
            StoreError::EmailTaken(email.to_string())
        }
        _ => StoreError::Database(err),
    }
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_uuid(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

#[derive(Debug, Error)]
#[error("unknown {kind} label '{value}'")]
struct UnknownLabel {
    kind: &'static str,
    value: String,
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let role_str: String = row.get(7)?;
    let role = Role::parse(&role_str).ok_or_else(|| {
        conversion_error(
            7,
            UnknownLabel {
                kind: "role",
                value: role_str.clone(),
            },
        )
    })?;
    let dob: String = row.get(5)?;
    let date_of_birth =
        NaiveDate::parse_from_str(&dob, "%Y-%m-%d").map_err(|e| conversion_error(5, e))?;

    Ok(User {
        id: parse_uuid(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        phone: row.get(4)?,
        date_of_birth,
        cpf: row.get(6)?,
        role,
        created_at: row.get(8)?,
        addresses: Vec::new(),
    })
}

fn address_from_row(row: &Row) -> rusqlite::Result<Address> {
    let kind_str: String = row.get(7)?;
    let kind = AddressType::parse(&kind_str).ok_or_else(|| {
        conversion_error(
            7,
            UnknownLabel {
                kind: "address type",
                value: kind_str.clone(),
            },
        )
    })?;

    Ok(Address {
        id: parse_uuid(row, 0)?,
        user_id: parse_uuid(row, 1)?,
        address: row.get(2)?,
        city: row.get(3)?,
        state: row.get(4)?,
        postal_code: row.get(5)?,
        country: row.get(6)?,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let store = UserStore::new(temp_file.path(), 4).unwrap();
        (store, temp_file)
    }

    fn new_user(email: &str, role: Role) -> CreateUserRequest {
        CreateUserRequest {
            name: "Ana Souza".to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
            phone: "11999990000".to_string(),
            address: "Rua das Flores, 10".to_string(),
            city: "São Paulo".to_string(),
            state: "SP".to_string(),
            postal_code: "01000-000".to_string(),
            country: "BR".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
            cpf: "12345678900".to_string(),
            address_type: AddressType::Shipping,
            role,
        }
    }

    #[tokio::test]
    async fn test_bootstrap_admin_created_once() {
        let (store, _temp) = create_test_store();

        assert!(store.ensure_admin("admin@localhost", "admin123").unwrap());
        assert!(!store.ensure_admin("other@localhost", "admin123").unwrap());

        let admin = store
            .find_user_by_email("admin@localhost")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert!(store.find_user_by_email("other@localhost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_and_retrieve_user() {
        let (store, _temp) = create_test_store();

        let created = store
            .create_user(new_user("ana@example.com", Role::Manager))
            .await
            .unwrap();
        assert_ne!(created.password_hash, "password123");
        assert_eq!(created.addresses.len(), 1);

        let by_email = store
            .find_user_by_email("ana@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_email.role, Role::Manager);

        let by_id = store.find_user_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.addresses[0].city, "São Paulo");
        assert_eq!(by_id.addresses[0].kind, AddressType::Shipping);
        assert_eq!(by_id.date_of_birth, created.date_of_birth);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (store, _temp) = create_test_store();
        store
            .create_user(new_user("ana@example.com", Role::Customer))
            .await
            .unwrap();

        let err = store
            .create_user(new_user("ana@example.com", Role::Customer))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EmailTaken(email) if email == "ana@example.com"));
        assert_eq!(store.find_all_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_password_verification() {
        let (store, _temp) = create_test_store();
        let user = store
            .create_user(new_user("ana@example.com", Role::Customer))
            .await
            .unwrap();

        assert!(store
            .validate_password("password123", &user.password_hash)
            .await
            .unwrap());
        assert!(!store
            .validate_password("wrongpassword", &user.password_hash)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_update_rehashes_password_and_updates_address() {
        let (store, _temp) = create_test_store();
        let user = store
            .create_user(new_user("ana@example.com", Role::Customer))
            .await
            .unwrap();

        let updated = store
            .update_user(
                user.id,
                UpdateUserRequest {
                    name: Some("Ana Lima".to_string()),
                    password: Some("n3w-password".to_string()),
                    city: Some("Recife".to_string()),
                    address_type: Some(AddressType::Billing),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "Ana Lima");
        assert_eq!(updated.email, "ana@example.com");
        assert_eq!(updated.addresses[0].city, "Recife");
        assert_eq!(updated.addresses[0].state, "SP");
        assert_eq!(updated.addresses[0].kind, AddressType::Billing);
        assert!(store
            .validate_password("n3w-password", &updated.password_hash)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_update_creates_missing_address() {
        let (store, _temp) = create_test_store();
        store.ensure_admin("admin@localhost", "admin123").unwrap();
        let admin = store
            .find_user_by_email("admin@localhost")
            .await
            .unwrap()
            .unwrap();

        let updated = store
            .update_user(
                admin.id,
                UpdateUserRequest {
                    city: Some("Natal".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.addresses.len(), 1);
        assert_eq!(updated.addresses[0].city, "Natal");
        assert_eq!(updated.addresses[0].address, "");
        assert_eq!(updated.addresses[0].kind, AddressType::Shipping);
    }

    #[tokio::test]
    async fn test_update_unknown_user() {
        let (store, _temp) = create_test_store();
        let result = store
            .update_user(Uuid::new_v4(), UpdateUserRequest::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_user() {
        let (store, _temp) = create_test_store();
        let user = store
            .create_user(new_user("tmp@example.com", Role::Customer))
            .await
            .unwrap();

        let deleted = store.delete_user(user.id).await.unwrap().unwrap();
        assert_eq!(deleted.email, "tmp@example.com");
        assert_eq!(deleted.addresses.len(), 1);

        assert!(store.find_user_by_id(user.id).await.unwrap().is_none());
        assert!(store.delete_user(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_users() {
        let (store, _temp) = create_test_store();
        store.ensure_admin("admin@localhost", "admin123").unwrap();
        store
            .create_user(new_user("m@example.com", Role::Manager))
            .await
            .unwrap();
        store
            .create_user(new_user("c@example.com", Role::Customer))
            .await
            .unwrap();

        let users = store.find_all_users().await.unwrap();
        assert_eq!(users.len(), 3);
        assert!(users.iter().all(|u| u.addresses.is_empty()));
    }
}
