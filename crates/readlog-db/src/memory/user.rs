//! In-memory implementation of [`UserRepository`].

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use readlog_core::error::{ReadlogError, ReadlogResult};
use readlog_core::models::user::{CreateUser, User, normalize};
use readlog_core::repository::UserRepository;
use uuid::Uuid;

use super::lock;
use crate::error::DbError;
use crate::password::{self, UserStoreConfig};

#[derive(Default)]
struct Users {
    by_id: HashMap<Uuid, User>,
    by_username: HashMap<String, Uuid>,
    by_email: HashMap<String, Uuid>,
    roles: HashMap<Uuid, BTreeSet<String>>,
}

#[derive(Clone, Default)]
pub struct MemoryUserRepository {
    users: Arc<Mutex<Users>>,
    config: UserStoreConfig,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: UserStoreConfig) -> Self {
        Self {
            users: Arc::default(),
            config,
        }
    }

    /// Remove a user and its role assignments. Refresh tokens issued to
    /// the user are left in place.
    pub fn remove(&self, id: Uuid) -> ReadlogResult<bool> {
        let mut users = lock(&self.users)?;
        let Some(user) = users.by_id.remove(&id) else {
            return Ok(false);
        };
        users.by_username.remove(&normalize(&user.username));
        users.by_email.remove(&normalize(&user.email));
        users.roles.remove(&id);
        Ok(true)
    }

    fn lookup(&self, index: impl Fn(&Users) -> Option<Uuid>) -> Result<Option<User>, DbError> {
        let users = lock(&self.users)?;
        Ok(index(&users).and_then(|id| users.by_id.get(&id).cloned()))
    }
}

fn not_found(id: String) -> ReadlogError {
    ReadlogError::NotFound {
        entity: "user".into(),
        id,
    }
}

impl UserRepository for MemoryUserRepository {
    async fn create(&self, input: CreateUser) -> ReadlogResult<User> {
        let errors = password::validate_new_user(&input, &self.config.password_policy);
        if !errors.is_empty() {
            return Err(ReadlogError::Validation { errors });
        }

        let password_hash = password::hash_password(&input.password, self.config.pepper.as_deref())?;

        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();
        let normalized_username = normalize(&username);
        let normalized_email = normalize(&email);

        let mut users = lock(&self.users)?;
        if users.by_username.contains_key(&normalized_username) {
            return Err(ReadlogError::AlreadyExists {
                entity: "user".into(),
                field: "username".into(),
                value: username,
            });
        }
        if users.by_email.contains_key(&normalized_email) {
            return Err(ReadlogError::AlreadyExists {
                entity: "user".into(),
                field: "email".into(),
                value: email,
            });
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            created_at: now,
            updated_at: now,
        };
        users.by_username.insert(normalized_username, user.id);
        users.by_email.insert(normalized_email, user.id);
        users.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> ReadlogResult<User> {
        self.lookup(|_| Some(id))?
            .ok_or_else(|| not_found(id.to_string()))
    }

    async fn get_by_email(&self, email: &str) -> ReadlogResult<User> {
        let key = normalize(email);
        self.lookup(|users| users.by_email.get(&key).copied())?
            .ok_or_else(|| not_found(format!("email={email}")))
    }

    async fn get_by_username(&self, username: &str) -> ReadlogResult<User> {
        let key = normalize(username);
        self.lookup(|users| users.by_username.get(&key).copied())?
            .ok_or_else(|| not_found(format!("username={username}")))
    }

    async fn verify_password(&self, user: &User, password: &str) -> ReadlogResult<bool> {
        password::verify_password(password, &user.password_hash, self.config.pepper.as_deref())
            .map_err(Into::into)
    }

    async fn assign_role(&self, user_id: Uuid, role: &str) -> ReadlogResult<()> {
        let mut users = lock(&self.users)?;
        if !users.by_id.contains_key(&user_id) {
            return Err(not_found(user_id.to_string()));
        }
        users
            .roles
            .entry(user_id)
            .or_default()
            .insert(role.to_string());
        Ok(())
    }

    async fn get_roles(&self, user_id: Uuid) -> ReadlogResult<Vec<String>> {
        let users = lock(&self.users)?;
        Ok(users
            .roles
            .get(&user_id)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }
}
