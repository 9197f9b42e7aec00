//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own session, auth and settings logic so route handlers
//! can stay focused on protocol translation and cookie plumbing. Anything
//! that talks to the platform API does so through the traits in [`api`].

pub mod api;
pub mod auth;
pub mod cache;
pub mod guard;
pub mod phone;
pub mod session;
pub mod settings;
pub mod tokens;
