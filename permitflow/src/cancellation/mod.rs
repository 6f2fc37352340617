//! Cooperative cancellation for async steps.

mod token;

pub use token::CancellationToken;
