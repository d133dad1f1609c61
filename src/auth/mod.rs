//! Authentication Module
//! Mission: Token issuance, token verification and role-gated route protection

pub mod api;
pub mod errors;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod user_store;

pub use api::AuthState;
pub use errors::{AuthError, LoginError};
pub use jwt::JwtHandler;
pub use middleware::{authenticate, authorize, AuthContext};
pub use models::{Claims, Role};
pub use user_store::UserStore;
