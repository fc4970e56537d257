//! Escrow plane: the trade lifecycle state machine and the bond ledger.
//!
//! Trades enter through [`EscrowStateMachine`]'s `TradeSink` implementation
//! (fed by the matching engine), then walk the lifecycle:
//!
//! ```text
//! pending -> funded -> in_progress -> completed
//!    |          |           |
//!    +----------+-----------+--> disputed --> completed
//!    |          |
//!    |          +--> expired (sweep)
//!    +--> cancelled | expired
//! ```
//!
//! Every transition is chain-call-first: on-chain settlement must succeed
//! before off-chain state advances. The [`BondLedger`] accounts for both
//! parties' security bonds and enforces value conservation on settlement.

pub mod bonds;
pub mod state;
pub mod vault;

pub use bonds::BondLedger;
pub use state::EscrowStateMachine;
pub use vault::TradeVault;
