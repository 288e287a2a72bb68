pub mod auth_user;
mod client_info;

pub use auth_user::AuthUser;
