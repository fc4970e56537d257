//! # peerdeal-types
//!
//! Shared types, errors, and configuration for the **PeerDeal** escrow
//! marketplace core.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OfferId`], [`UserId`], [`TradeId`], [`DisputeId`], [`PolicyId`], [`ClaimId`], [`Market`]
//! - **Offer model**: [`Offer`], [`OfferSide`], [`OfferStatus`], [`OfferRequirements`]
//! - **Trade model**: [`Trade`], [`TradeStatus`], [`TradeAction`] and the escrow transition table
//! - **Bond model**: [`BondRecord`], [`BondDisposition`]
//! - **Dispute model**: [`Dispute`], [`EscalationTier`], [`DisputeStatus`], [`Ruling`]
//! - **Insurance model**: [`InsurancePolicy`], [`InsuranceClaim`]
//! - **Profiles**: [`TraderProfile`] (reputation, KYC, fee discounts)
//! - **Configuration**: [`MarketplaceConfig`] and its sub-configs
//! - **Ports**: [`ChainAdapter`], [`RulingOracle`], [`NotificationSink`]
//! - **Errors**: [`PeerdealError`] with `PD_ERR_` prefix codes

pub mod bond;
pub mod config;
pub mod constants;
pub mod dispute;
pub mod error;
pub mod ids;
pub mod insurance;
pub mod offer;
pub mod ports;
pub mod profile;
pub mod trade;

// Re-export all primary types at crate root for ergonomic imports:
//   use peerdeal_types::{Offer, OfferSide, Trade, Dispute, ...};

pub use bond::*;
pub use config::*;
pub use dispute::*;
pub use error::*;
pub use ids::*;
pub use insurance::*;
pub use offer::*;
pub use ports::*;
pub use profile::*;
pub use trade::*;

// Constants are accessed via `peerdeal_types::constants::FOO`
// (not re-exported to avoid name collisions).
