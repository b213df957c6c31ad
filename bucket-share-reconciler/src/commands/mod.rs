//! Commands module - share orchestration for bucket grants and revokes

mod approve;
mod revoke;
pub(crate) mod service;

pub use service::ShareManager;
