//! Boundary contracts to external collaborators.
//!
//! The core never talks to a blockchain, an AI backend, or a delivery
//! channel directly — each sits behind one of these traits:
//!
//! - [`ChainAdapter`]: on-chain escrow settlement, at-least-once with
//!   idempotent confirmation. A failed chain call must never let off-chain
//!   state advance.
//! - [`RulingOracle`]: the non-deterministic dispute analyzer (human or AI).
//!   May fail or time out; the dispute engine auto-escalates on failure.
//! - [`NotificationSink`]: fire-and-forget delivery, best-effort. Failures
//!   never block state transitions.
//!
//! Test doubles live behind the `test-helpers` feature.

use rust_decimal::Decimal;

use crate::{Dispute, Result, Ruling, Trade, TradeId, TradeTerms, UserId};

/// Seam between the matching engine and the escrow plane: the book crate
/// commits matched terms through this without depending on the escrow
/// crate. Implemented by the escrow state machine.
pub trait TradeSink: Send + Sync {
    /// Create a trade from committed match terms (initial status pending).
    fn create_trade(&self, terms: TradeTerms) -> Result<TradeId>;
}

/// On-chain escrow operations. Implementations must be safe to retry.
pub trait ChainAdapter: Send + Sync {
    /// Lock the seller's escrow on chain.
    fn fund(&self, trade_id: TradeId, amount: Decimal) -> Result<()>;

    /// Release the escrow to the buyer.
    fn release(&self, trade_id: TradeId) -> Result<()>;

    /// Refund the escrow to the seller (expiry / cancellation path).
    fn refund(&self, trade_id: TradeId) -> Result<()>;

    /// Settle the escrow per a dispute ruling.
    fn resolve_dispute(&self, trade_id: TradeId, ruling: Ruling) -> Result<()>;
}

/// The verdict an oracle produces for a dispute.
#[derive(Debug, Clone)]
pub struct OracleVerdict {
    pub ruling: Ruling,
    /// Confidence score, 0-100.
    pub confidence: u8,
    pub reasoning: String,
}

/// External decision-maker consulted during dispute review.
pub trait RulingOracle: Send + Sync {
    /// Analyze the trade plus the dispute's context (reason, chat
    /// transcript, submitted evidence) and produce a verdict.
    ///
    /// # Errors
    /// `OracleUnavailable` on failure or timeout; the caller must fall back
    /// to escalation, never block.
    fn analyze(&self, trade: &Trade, dispute: &Dispute) -> Result<OracleVerdict>;
}

/// Best-effort event delivery to users.
pub trait NotificationSink: Send + Sync {
    /// Fire-and-forget. Implementations should swallow their own failures.
    fn notify(&self, user_id: UserId, event: &str, payload: serde_json::Value);
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[cfg(any(test, feature = "test-helpers"))]
pub mod doubles {
    //! In-memory test implementations of the boundary ports.

    use std::sync::Mutex;

    use rust_decimal::Decimal;

    use super::{ChainAdapter, NotificationSink, OracleVerdict, RulingOracle};
    use crate::{Dispute, PeerdealError, Result, Ruling, Trade, TradeId, UserId};

    /// Records every chain call; individual operations can be scripted to
    /// fail.
    #[derive(Default)]
    pub struct RecordingChain {
        pub calls: Mutex<Vec<String>>,
        pub fail_fund: Mutex<bool>,
        pub fail_release: Mutex<bool>,
        pub fail_refund: Mutex<bool>,
        pub fail_resolve: Mutex<bool>,
    }

    impl RecordingChain {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail_resolve(&self, fail: bool) {
            *self.fail_resolve.lock().unwrap() = fail;
        }

        pub fn set_fail_fund(&self, fail: bool) {
            *self.fail_fund.lock().unwrap() = fail;
        }

        pub fn call_log(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, op: &str, trade_id: TradeId, fail: &Mutex<bool>) -> Result<()> {
            if *fail.lock().unwrap() {
                return Err(PeerdealError::ChainCallFailed {
                    operation: "scripted",
                    reason: format!("{op} scripted to fail"),
                });
            }
            self.calls.lock().unwrap().push(format!("{op}:{trade_id}"));
            Ok(())
        }
    }

    impl ChainAdapter for RecordingChain {
        fn fund(&self, trade_id: TradeId, _amount: Decimal) -> Result<()> {
            self.record("fund", trade_id, &self.fail_fund)
        }

        fn release(&self, trade_id: TradeId) -> Result<()> {
            self.record("release", trade_id, &self.fail_release)
        }

        fn refund(&self, trade_id: TradeId) -> Result<()> {
            self.record("refund", trade_id, &self.fail_refund)
        }

        fn resolve_dispute(&self, trade_id: TradeId, _ruling: Ruling) -> Result<()> {
            self.record("resolve_dispute", trade_id, &self.fail_resolve)
        }
    }

    /// Returns a pre-scripted verdict, or errors when scripted to fail.
    pub struct ScriptedOracle {
        verdict: Mutex<Option<OracleVerdict>>,
    }

    impl ScriptedOracle {
        /// Oracle that always returns the given verdict.
        #[must_use]
        pub fn returning(ruling: Ruling, confidence: u8) -> Self {
            Self {
                verdict: Mutex::new(Some(OracleVerdict {
                    ruling,
                    confidence,
                    reasoning: "scripted verdict".to_string(),
                })),
            }
        }

        /// Oracle that always fails (simulated timeout).
        #[must_use]
        pub fn failing() -> Self {
            Self {
                verdict: Mutex::new(None),
            }
        }
    }

    impl RulingOracle for ScriptedOracle {
        fn analyze(&self, _trade: &Trade, _dispute: &Dispute) -> Result<OracleVerdict> {
            self.verdict
                .lock()
                .unwrap()
                .clone()
                .ok_or(PeerdealError::OracleUnavailable {
                    reason: "scripted timeout".to_string(),
                })
        }
    }

    /// Records notifications for assertions.
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub events: Mutex<Vec<(UserId, String)>>,
    }

    impl RecordingNotifier {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events_for(&self, user_id: UserId) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|(u, _)| *u == user_id)
                .map(|(_, e)| e.clone())
                .collect()
        }
    }

    impl NotificationSink for RecordingNotifier {
        fn notify(&self, user_id: UserId, event: &str, _payload: serde_json::Value) {
            self.events
                .lock()
                .unwrap()
                .push((user_id, event.to_string()));
        }
    }

    /// Discards everything.
    #[derive(Default)]
    pub struct NullNotifier;

    impl NotificationSink for NullNotifier {
        fn notify(&self, _user_id: UserId, _event: &str, _payload: serde_json::Value) {}
    }
}
