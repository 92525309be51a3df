pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod runs;
pub mod state;
pub mod store;

pub use router::app;
pub use state::AppState;
