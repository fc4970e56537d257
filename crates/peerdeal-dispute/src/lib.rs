//! Dispute plane: tiered resolution and insurance reaction.
//!
//! The [`DisputeEngine`] drives a dispute through three tiers:
//!
//! ```text
//! tier 1: automated review (2h)  -- oracle verdict, strong => auto-apply
//! tier 2: arbitration      (24h) -- human arbitrator verdict
//! tier 3: DAO vote         (72h) -- binding community vote
//! ```
//!
//! Accepting a ruling at any tier resolves the dispute: the trade completes
//! through the escrow state machine, bonds settle per the ruling, and the
//! [`InsuranceClaimProcessor`] auto-files a claim for a covered loser.

pub mod engine;
pub mod insurance;

pub use engine::{DisputeEngine, OverdueDispute};
pub use insurance::InsuranceClaimProcessor;
