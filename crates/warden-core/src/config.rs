use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL (e.g. sqlite://warden.db, postgres://...)
    pub database_url: String,

    /// Upper bound of pooled database connections (default: 10)
    pub database_max_connections: u32,

    /// Access-token signing secret
    pub jwt_secret: String,

    /// Access-token lifetime in minutes (default: 15)
    pub access_token_ttl_minutes: i64,

    /// Refresh-token lifetime in days (default: 30)
    pub refresh_token_ttl_days: i64,

    /// Environment: development, production, test
    pub environment: String,

    /// Upper bound for a single audit-log write in milliseconds (default: 2000)
    pub audit_write_timeout_ms: u64,

    /// Seconds between two scheduled cleanup sweeps (default: 3600)
    pub cleanup_interval_secs: u64,

    /// Suspicious-activity heuristics.
    pub detector: DetectorConfig,

    /// Retention windows used by the cleanup sweep.
    pub retention: RetentionConfig,
}

/// Thresholds and windows of the suspicious-activity heuristics.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Window for counting distinct IPs with failed logins.
    pub failed_login_window_minutes: i64,
    /// Distinct failing IPs that make a burst suspicious.
    pub failed_login_distinct_ips: u64,
    /// How far back successful logins count as known locations.
    pub known_ip_lookback_days: i64,
    /// Window for counting password changes.
    pub password_change_window_hours: i64,
    /// Password changes inside the window that make it suspicious.
    pub password_change_burst: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            failed_login_window_minutes: 60,
            failed_login_distinct_ips: 3,
            known_ip_lookback_days: 30,
            password_change_window_hours: 24,
            password_change_burst: 2,
        }
    }
}

/// Retention windows for the cleanup sweep.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    /// Revoked refresh tokens are kept this long after revocation.
    pub revoked_token_grace_days: i64,
    /// Security log rows older than this are deleted.
    pub security_log_days: i64,
    /// Password history rows kept per user.
    pub password_history_per_user: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            revoked_token_grace_days: 7,
            security_log_days: 90,
            password_history_per_user: 5,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables (with .env support).
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        // Load .env file if present (ignore errors if missing)
        let _ = dotenvy::dotenv();

        let defaults = RetentionConfig::default();
        let retention = RetentionConfig {
            revoked_token_grace_days: env_or(
                "RETENTION_REVOKED_TOKEN_DAYS",
                defaults.revoked_token_grace_days,
            ),
            security_log_days: env_or("RETENTION_SECURITY_LOG_DAYS", defaults.security_log_days),
            password_history_per_user: env_or(
                "RETENTION_PASSWORD_HISTORY",
                defaults.password_history_per_user,
            ),
        };

        Ok(Config {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://warden.db?mode=rwc".to_string()),
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            jwt_secret: std::env::var("JWT_SECRET")
                .unwrap_or_else(|_| "warden-dev-secret-change-me".to_string()),
            access_token_ttl_minutes: env_or("ACCESS_TOKEN_TTL_MINUTES", 15),
            refresh_token_ttl_days: env_or("REFRESH_TOKEN_TTL_DAYS", 30),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            audit_write_timeout_ms: env_or("AUDIT_WRITE_TIMEOUT_MS", 2000),
            cleanup_interval_secs: env_or("CLEANUP_INTERVAL_SECS", 3600),
            detector: DetectorConfig::default(),
            retention,
        })
    }

    /// Configuration for tests: in-memory SQLite and a fixed secret.
    pub fn for_tests() -> Self {
        Config {
            database_url: "sqlite::memory:".to_string(),
            database_max_connections: 1,
            jwt_secret: "test-secret-key-for-testing".to_string(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 30,
            environment: "test".to_string(),
            audit_write_timeout_ms: 2000,
            cleanup_interval_secs: 3600,
            detector: DetectorConfig::default(),
            retention: RetentionConfig::default(),
        }
    }

    /// Check if running in development mode.
    pub fn is_dev(&self) -> bool {
        self.environment == "development"
    }

    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_token_ttl_minutes)
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_ttl_days)
    }

    pub fn audit_write_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.audit_write_timeout_ms)
    }
}
