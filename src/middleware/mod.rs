pub mod auth;

pub use auth::{bearer_token, jwt_auth_middleware, AuthUser};
