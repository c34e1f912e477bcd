//! OAuth client application registration and access-token lifecycle service.
//!
//! Provisions OAuth clients for consumer applications through an external
//! key manager, issues and renews access tokens, and keeps the multi-step
//! registration workflow durable and resumable.

pub mod config;
pub mod errors;
pub mod http;
pub mod keymanager;
pub mod registry;
pub mod storage;
