// handlers/mod.rs - route handlers by access tier
//
// Public: service index, health, sitemap, run lookups, login and refresh.
// Protected (JWT with admin role): user creation.

pub mod auth;
pub mod public;
pub mod runs;
