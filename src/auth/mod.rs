//! Authentication building blocks: password hashing and identity tokens.

pub mod password;
pub mod token;

pub use token::{InvalidToken, TokenIssuer};
