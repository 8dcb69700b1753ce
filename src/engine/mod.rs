//! The tiered collection engine.
//!
//! `TierScheduler` drives the drift-corrected sampling loop,
//! `TierBroadcaster` fans tier updates out to registered listeners, and
//! `TierGate` decides when the medium and slow tiers are due.

mod broadcaster;
mod gate;
mod scheduler;

pub use broadcaster::{ListenerId, TierBroadcaster, TierEvent};
pub use gate::TierGate;
pub use scheduler::TierScheduler;
