//! Quillbox — a self-hosted personal notes service.
//!
//! A single-binary JSON API: users register and log in, receive a signed
//! time-limited token, and manage a private collection of rich-text notes
//! (create, edit, delete, search, bulk import/export). Every note operation
//! is scoped to the authenticated owner at the storage layer, so one user's
//! notes are invisible to every other user.

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod sanitize;
pub mod store;
pub mod validate;
