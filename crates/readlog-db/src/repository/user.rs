//! SurrealDB implementation of [`UserRepository`].

use chrono::{DateTime, Utc};
use readlog_core::error::{ReadlogError, ReadlogResult};
use readlog_core::models::user::{CreateUser, User, normalize};
use readlog_core::repository::UserRepository;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbError;
use crate::password::{self, UserStoreConfig};

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct UserRow {
    username: String,
    email: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    username: String,
    email: String,
    password_hash: String,
    first_name: Option<String>,
    last_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, SurrealValue)]
struct RoleRow {
    role: String,
}

impl UserRow {
    fn into_user(self, id: Uuid) -> User {
        User {
            id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid user UUID: {e}")))?;
        Ok(User {
            id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            first_name: self.first_name,
            last_name: self.last_name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Which unique column a rejected insert collided with, judged from
/// the index name in SurrealDB's error message.
fn conflicting_field(message: &str) -> Option<&'static str> {
    if message.contains("idx_user_username") {
        Some("username")
    } else if message.contains("idx_user_email") {
        Some("email")
    } else {
        None
    }
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    config: UserStoreConfig,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self::with_config(db, UserStoreConfig::default())
    }

    pub fn with_config(db: Surreal<C>, config: UserStoreConfig) -> Self {
        Self { db, config }
    }

    async fn find_by_normalized(
        &self,
        field: &'static str,
        value: &str,
    ) -> Result<Option<User>, DbError> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM user \
             WHERE {field} = $value LIMIT 1"
        );
        let mut result = self
            .db
            .query(query)
            .bind(("value", normalize(value)))
            .await?;

        let rows: Vec<UserRowWithId> = result.take(0)?;
        rows.into_iter()
            .next()
            .map(UserRowWithId::try_into_user)
            .transpose()
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> ReadlogResult<User> {
        let errors = password::validate_new_user(&input, &self.config.password_policy);
        if !errors.is_empty() {
            return Err(ReadlogError::Validation { errors });
        }

        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();

        if self
            .find_by_normalized("normalized_username", &username)
            .await?
            .is_some()
        {
            return Err(ReadlogError::AlreadyExists {
                entity: "user".into(),
                field: "username".into(),
                value: username,
            });
        }
        if self
            .find_by_normalized("normalized_email", &email)
            .await?
            .is_some()
        {
            return Err(ReadlogError::AlreadyExists {
                entity: "user".into(),
                field: "email".into(),
                value: email,
            });
        }

        let password_hash = password::hash_password(&input.password, self.config.pepper.as_deref())?;

        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let response = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 username = $username, \
                 normalized_username = $normalized_username, \
                 email = $email, \
                 normalized_email = $normalized_email, \
                 password_hash = $password_hash, \
                 first_name = $first_name, \
                 last_name = $last_name",
            )
            .bind(("id", id_str.clone()))
            .bind(("normalized_username", normalize(&username)))
            .bind(("username", username.clone()))
            .bind(("normalized_email", normalize(&email)))
            .bind(("email", email.clone()))
            .bind(("password_hash", password_hash))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .await
            .map_err(DbError::from)?;

        // A concurrent insert can still win between the lookups above
        // and this statement; the unique indexes catch it.
        let mut response = match response.check() {
            Ok(response) => response,
            Err(e) => {
                let message = e.to_string();
                return Err(match conflicting_field(&message) {
                    Some(field) => ReadlogError::AlreadyExists {
                        entity: "user".into(),
                        field: field.into(),
                        value: if field == "email" { email } else { username },
                    },
                    None => DbError::from(e).into(),
                });
            }
        };

        let rows: Vec<UserRow> = response.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        debug!(user_id = %id, "User created");
        Ok(row.into_user(id))
    }

    async fn get_by_id(&self, id: Uuid) -> ReadlogResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('user', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id))
    }

    async fn get_by_email(&self, email: &str) -> ReadlogResult<User> {
        self.find_by_normalized("normalized_email", email)
            .await?
            .ok_or_else(|| ReadlogError::NotFound {
                entity: "user".into(),
                id: format!("email={email}"),
            })
    }

    async fn get_by_username(&self, username: &str) -> ReadlogResult<User> {
        self.find_by_normalized("normalized_username", username)
            .await?
            .ok_or_else(|| ReadlogError::NotFound {
                entity: "user".into(),
                id: format!("username={username}"),
            })
    }

    async fn verify_password(&self, user: &User, password: &str) -> ReadlogResult<bool> {
        password::verify_password(password, &user.password_hash, self.config.pepper.as_deref())
            .map_err(Into::into)
    }

    async fn assign_role(&self, user_id: Uuid, role: &str) -> ReadlogResult<()> {
        // Fails with NotFound for unknown users.
        self.get_by_id(user_id).await?;

        let user_id_str = user_id.to_string();
        let mut existing = self
            .db
            .query("SELECT role FROM user_role WHERE user_id = $user_id AND role = $role")
            .bind(("user_id", user_id_str.clone()))
            .bind(("role", role.to_string()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<RoleRow> = existing.take(0).map_err(DbError::from)?;
        if !rows.is_empty() {
            return Ok(());
        }

        let response = self
            .db
            .query("CREATE user_role SET user_id = $user_id, role = $role")
            .bind(("user_id", user_id_str))
            .bind(("role", role.to_string()))
            .await
            .map_err(DbError::from)?;

        match response.check() {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("idx_user_role") => Ok(()),
            Err(e) => Err(DbError::from(e).into()),
        }
    }

    async fn get_roles(&self, user_id: Uuid) -> ReadlogResult<Vec<String>> {
        let mut result = self
            .db
            .query("SELECT role FROM user_role WHERE user_id = $user_id ORDER BY role ASC")
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().map(|r| r.role).collect())
    }
}
