//! Persistence layer: profile storage behind a backend-agnostic trait.

pub mod memory;
pub mod traits;

pub use memory::InMemoryProfileRepository;
pub use traits::ProfileRepository;
