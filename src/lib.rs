pub mod backend;
pub mod cache;
pub mod candidate;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod editor;
pub mod error;
pub mod logging;
pub mod worker;

pub use cache::SharedCompletionCache;
pub use candidate::{Candidate, CandidateList};
pub use coordinator::{CompletionCoordinator, CompletionResponse};
