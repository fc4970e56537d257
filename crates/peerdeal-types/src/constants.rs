//! System-wide constants for the PeerDeal escrow core.
//!
//! Decimal-valued defaults (base fees, bond rate, split penalty) live in
//! `config.rs` as `Default` impls, since `Decimal` construction is not
//! const-friendly.

/// Confidence threshold (0-100) for automated dispute auto-resolution.
pub const AUTO_RESOLVE_CONFIDENCE: u8 = 90;

/// Automated review deadline (hours from dispute creation).
pub const AUTOMATED_REVIEW_DEADLINE_HOURS: i64 = 2;

/// Arbitration deadline (hours from entry into tier 2).
pub const ARBITRATION_DEADLINE_HOURS: i64 = 24;

/// DAO vote deadline (hours from entry into tier 3).
pub const DAO_VOTE_DEADLINE_HOURS: i64 = 72;

/// Default trade expiry window (hours from creation).
pub const DEFAULT_TRADE_EXPIRY_HOURS: i64 = 24;

/// Insurance claim idempotency guard size (disputes remembered).
pub const CLAIM_GUARD_CACHE_SIZE: usize = 100_000;
