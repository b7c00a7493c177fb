//! Types
//!
//! Credential, token, configuration and authorization types.

pub mod auth;
pub mod config;
pub mod credential;
pub mod token;

pub use auth::*;
pub use config::*;
pub use credential::{Credential, TokenEvent, TokenState};
pub use token::*;
