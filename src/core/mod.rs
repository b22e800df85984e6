//! Quote polling, valuation readings and the configuration flow

pub mod config;
pub mod coordinator;
pub mod error;
pub mod flow;
pub mod holdings;
pub mod integration;
pub mod log;
pub mod quote;
pub mod reading;
pub mod registry;
pub mod symbols;

// Re-export main types for cleaner imports
pub use coordinator::{QuoteCoordinator, RefreshListener};
pub use error::{CoordinatorError, FlowError, RefreshFailure};
pub use quote::{QuoteProvider, QuoteSnapshot};
pub use reading::{Reading, ReadingState, StatePublisher};
