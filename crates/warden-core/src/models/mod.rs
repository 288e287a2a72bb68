pub mod email_verification;
pub mod password_history;
pub mod password_reset;
pub mod rate_limit;
pub mod refresh_token;
pub mod security_log;
