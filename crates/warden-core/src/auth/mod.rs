pub mod jwt;
pub mod password_history;
pub mod refresh;
pub mod sessions;
pub mod tokens;
pub mod verification;

pub use jwt::{AccessClaims, TokenCodec, TokenError};
pub use password_history::{PasswordHistory, hash_password, verify_password};
pub use refresh::{IssuedRefreshToken, RefreshTokenStore, RotatedToken, Rotation};
pub use sessions::{SessionRegistry, SessionView};
pub use tokens::{generate_secure_token, hash_token};
pub use verification::VerificationTokens;
