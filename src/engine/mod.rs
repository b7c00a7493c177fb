//! Token Lifecycle Engine
//!
//! Credential state machine, persistence actor and proactive refresher.

pub mod lifecycle;
mod persist;
pub mod refresher;

pub use lifecycle::{EngineOptions, TokenLifecycleEngine};
pub use refresher::ProactiveRefresh;
