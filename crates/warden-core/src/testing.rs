//! Helpers for integration tests against in-memory SQLite.
//!
//! ```rust,ignore
//! #[tokio::test]
//! async fn test_logout() {
//!     let app = TestWarden::new().await;
//!     let client = ClientInfo::new("203.0.113.9", None);
//!     let session = app.warden.start_session(1, &client).await.unwrap();
//!     assert!(app.warden.end_session(&session.refresh_token.secret, &client).await.unwrap());
//! }
//! ```

use sea_orm::DatabaseConnection;

use crate::config::Config;
use crate::db;
use crate::engine::Warden;

/// Fresh migrated in-memory database on a single pooled connection.
///
/// # Panics
///
/// Panics if the database cannot be opened or migrated.
pub async fn memory_db() -> DatabaseConnection {
    db::connect_and_migrate(&Config::for_tests())
        .await
        .expect("in-memory SQLite should open and migrate")
}

/// A [`Warden`] over its own in-memory database.
pub struct TestWarden {
    pub db: DatabaseConnection,
    pub config: Config,
    pub warden: Warden,
}

impl TestWarden {
    pub async fn new() -> Self {
        Self::with_config(Config::for_tests()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let db = db::connect_and_migrate(&config)
            .await
            .expect("in-memory SQLite should open and migrate");
        let warden = Warden::new(db.clone(), &config);
        Self { db, config, warden }
    }
}
