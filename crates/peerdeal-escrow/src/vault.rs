//! The trade vault: keyed trade aggregates with per-trade serialization.
//!
//! Every mutation of a trade goes through [`TradeVault::with_trade`], which
//! holds that trade's lock for the duration — no two transitions for the
//! same `TradeId` ever interleave.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use peerdeal_types::{PeerdealError, Result, Trade, TradeId};

/// Owns all trades, keyed by id.
pub struct TradeVault {
    trades: RwLock<HashMap<TradeId, Arc<Mutex<Trade>>>>,
}

impl TradeVault {
    #[must_use]
    pub fn new() -> Self {
        Self {
            trades: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a freshly created trade.
    ///
    /// # Errors
    /// `DuplicateTrade` if the id is already present.
    pub fn insert(&self, trade: Trade) -> Result<()> {
        let mut trades = self.trades.write().expect("trade map poisoned");
        if trades.contains_key(&trade.id) {
            return Err(PeerdealError::DuplicateTrade(trade.id));
        }
        trades.insert(trade.id, Arc::new(Mutex::new(trade)));
        Ok(())
    }

    /// Snapshot of a single trade.
    pub fn get(&self, trade_id: TradeId) -> Result<Trade> {
        let handle = self.handle(trade_id)?;
        let trade = handle.lock().expect("trade lock poisoned");
        Ok(trade.clone())
    }

    /// Run `f` with exclusive access to the trade. All transitions for the
    /// same id are strictly ordered through this lock.
    pub fn with_trade<T>(
        &self,
        trade_id: TradeId,
        f: impl FnOnce(&mut Trade) -> Result<T>,
    ) -> Result<T> {
        let handle = self.handle(trade_id)?;
        let mut trade = handle.lock().expect("trade lock poisoned");
        f(&mut trade)
    }

    /// Ids of every trade in the vault (for sweeps).
    #[must_use]
    pub fn ids(&self) -> Vec<TradeId> {
        self.trades
            .read()
            .expect("trade map poisoned")
            .keys()
            .copied()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trades.read().expect("trade map poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handle(&self, trade_id: TradeId) -> Result<Arc<Mutex<Trade>>> {
        self.trades
            .read()
            .expect("trade map poisoned")
            .get(&trade_id)
            .cloned()
            .ok_or(PeerdealError::TradeNotFound(trade_id))
    }
}

impl Default for TradeVault {
    fn default() -> Self {
        Self::new()
    }
}
