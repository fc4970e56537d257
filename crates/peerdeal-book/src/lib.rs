//! # peerdeal-book
//!
//! **Matching plane**: the offer book, fee engine, and matching engine.
//!
//! ## Architecture
//!
//! 1. **FeeEngine**: pure fee/escrow/fiat computation with a hard 0.1% floor
//! 2. **OfferBook**: keyed offer aggregates, one lock per offer —
//!    linearizable fills, ascending-id pair locking
//! 3. **MatchingEngine**: price-time candidate ranking, direct accept and
//!    auto-match, all-or-nothing commits handed to the escrow plane via
//!    [`peerdeal_types::TradeSink`]
//!
//! ## Match flow
//!
//! ```text
//! place(offer) → find_candidates → fill_pair (both-or-neither)
//!              → FeeEngine.quote → TradeSink.create_trade
//! ```

pub mod book;
pub mod fees;
pub mod matcher;

pub use book::OfferBook;
pub use fees::{FeeBreakdown, FeeEngine};
pub use matcher::MatchingEngine;
