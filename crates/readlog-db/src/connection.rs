//! Connection to the SurrealDB server holding Readlog accounts, role
//! assignments and refresh tokens.

use std::env;

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

/// Where the Readlog store lives and the root credentials used to
/// reach it. `password` is never logged.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// `host:port` of the WebSocket endpoint.
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "readlog".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
        }
    }
}

impl DbConfig {
    /// Read `READLOG_DB_URL`, `READLOG_DB_NAMESPACE`, `READLOG_DB_DATABASE`,
    /// `READLOG_DB_USERNAME` and `READLOG_DB_PASSWORD`; unset variables
    /// keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str, fallback: String| env::var(name).unwrap_or(fallback);
        Self {
            url: var("READLOG_DB_URL", defaults.url),
            namespace: var("READLOG_DB_NAMESPACE", defaults.namespace),
            database: var("READLOG_DB_DATABASE", defaults.database),
            username: var("READLOG_DB_USERNAME", defaults.username),
            password: var("READLOG_DB_PASSWORD", defaults.password),
        }
    }
}

/// Signed-in handle to the Readlog store. Cloning shares the underlying
/// connection; the repositories each take their own clone of
/// [`DbManager::client`].
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Open the WebSocket connection, sign in as root and select the
    /// Readlog namespace and database. Migrations are run separately.
    pub async fn connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Opening Readlog store"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;
        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;
        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!("Readlog store ready");
        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}
