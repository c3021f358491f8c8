//! Stateless bearer-token gate for HTTP APIs.
//!
//! Issues HS256 tokens on login, validates them on every request, resolves
//! roles fresh from a [`services::auth::RoleLookup`], and lets an
//! [`services::auth::AuthorizationPolicy`] decide which paths need a caller.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
