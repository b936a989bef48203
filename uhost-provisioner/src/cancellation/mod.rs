//! Cooperative cancellation for provider waits.
//!
//! The orchestrator owns a [`CancellationToken`] per build; every polling
//! loop races its sleeps against [`CancellationToken::cancelled`].

mod token;

pub use token::CancellationToken;
