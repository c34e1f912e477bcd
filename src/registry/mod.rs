//! Registration workflow engine: the coordinator state machine, domain
//! management, keyed locks, and the shared data model.

pub mod coordinator;
pub mod domains;
pub mod locks;
pub mod types;

pub use coordinator::RegistrationCoordinator;
pub use domains::TokenDomainGuard;
pub use locks::KeyedLocks;
pub use types::*;
