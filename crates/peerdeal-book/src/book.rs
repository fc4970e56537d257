//! The offer book: an arena of independently serialized offer aggregates.
//!
//! Each offer sits behind its own mutex, so a fill is a single atomic
//! read-modify-write and two concurrent fills can never jointly overfill an
//! offer. Pair fills (both sides of a match) acquire the two offer locks in
//! ascending id order, which makes deadlock impossible.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use peerdeal_types::{Offer, OfferId, OfferStatus, PeerdealError, Result, UserId};

/// Holds all open offers, keyed by id.
pub struct OfferBook {
    offers: RwLock<HashMap<OfferId, Arc<Mutex<Offer>>>>,
}

impl OfferBook {
    #[must_use]
    pub fn new() -> Self {
        Self {
            offers: RwLock::new(HashMap::new()),
        }
    }

    // =================================================================
    // Placement
    // =================================================================

    /// Validate and place a new offer.
    ///
    /// # Errors
    /// `InvalidOffer` on validation failure, `DuplicateOffer` if the id is
    /// already present. Neither mutates the book.
    pub fn place(&self, offer: Offer) -> Result<OfferId> {
        offer.validate()?;
        let id = offer.id;
        let mut offers = self.offers.write().expect("offer map poisoned");
        if offers.contains_key(&id) {
            return Err(PeerdealError::DuplicateOffer(id));
        }
        tracing::debug!(offer_id = %id, side = %offer.side, amount = %offer.amount, "offer placed");
        offers.insert(id, Arc::new(Mutex::new(offer)));
        Ok(id)
    }

    // =================================================================
    // Filling
    // =================================================================

    /// Atomically fill `amount` against an offer.
    ///
    /// Linearizable per offer: the read-modify-write happens under the
    /// offer's lock, so concurrent fills whose sum exceeds the remaining
    /// amount cannot all succeed.
    ///
    /// # Errors
    /// `InsufficientRemaining` if `amount` exceeds what is left; the offer
    /// is untouched.
    pub fn fill(&self, offer_id: OfferId, amount: Decimal) -> Result<()> {
        let handle = self.handle(offer_id)?;
        let mut offer = handle.lock().expect("offer lock poisoned");
        Self::apply_fill(&mut offer, amount)
    }

    /// Atomically fill both sides of a match: all-or-nothing.
    ///
    /// Locks are acquired in ascending id order so two concurrent pair
    /// fills can never deadlock. If either side lacks the amount, neither
    /// is mutated.
    pub fn fill_pair(&self, id_a: OfferId, id_b: OfferId, amount: Decimal) -> Result<()> {
        if id_a == id_b {
            return Err(PeerdealError::SelfTradeBlocked);
        }
        let handle_a = self.handle(id_a)?;
        let handle_b = self.handle(id_b)?;

        // Fixed global lock order: ascending offer id.
        let (first, second) = if id_a < id_b {
            (&handle_a, &handle_b)
        } else {
            (&handle_b, &handle_a)
        };
        let mut guard_first = first.lock().expect("offer lock poisoned");
        let mut guard_second = second.lock().expect("offer lock poisoned");

        // Check both before mutating either.
        Self::check_fill(&guard_first, amount)?;
        Self::check_fill(&guard_second, amount)?;
        Self::apply_fill(&mut guard_first, amount)?;
        Self::apply_fill(&mut guard_second, amount)?;
        Ok(())
    }

    fn check_fill(offer: &Offer, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(PeerdealError::InvalidInput {
                reason: format!("fill amount must be positive, got {amount}"),
            });
        }
        if !offer.status.is_fillable() {
            return Err(PeerdealError::InvalidOffer {
                reason: format!("offer {} is {}, not fillable", offer.id, offer.status),
            });
        }
        let remaining = offer.remaining();
        if amount > remaining {
            return Err(PeerdealError::InsufficientRemaining {
                requested: amount,
                remaining,
            });
        }
        Ok(())
    }

    fn apply_fill(offer: &mut Offer, amount: Decimal) -> Result<()> {
        Self::check_fill(offer, amount)?;
        offer.filled_amount += amount;
        // filled_amount > amount here would mean the lock discipline broke.
        if offer.filled_amount > offer.amount {
            return Err(PeerdealError::FillOverflow {
                offer_id: offer.id,
                filled: offer.filled_amount,
                amount: offer.amount,
            });
        }
        offer.status = if offer.filled_amount == offer.amount {
            OfferStatus::Matched
        } else {
            OfferStatus::PartiallyFilled
        };
        tracing::debug!(
            offer_id = %offer.id,
            filled = %offer.filled_amount,
            status = %offer.status,
            "offer filled"
        );
        Ok(())
    }

    // =================================================================
    // Cancellation & expiry
    // =================================================================

    /// Cancel an offer. Creator only, `Open` status only, irreversible.
    pub fn cancel(&self, offer_id: OfferId, caller: UserId) -> Result<()> {
        let handle = self.handle(offer_id)?;
        let mut offer = handle.lock().expect("offer lock poisoned");
        if offer.creator_id != caller {
            return Err(PeerdealError::InvalidOffer {
                reason: "only the creator may cancel an offer".into(),
            });
        }
        if offer.status != OfferStatus::Open {
            return Err(PeerdealError::OfferNotCancellable(offer.status));
        }
        offer.status = OfferStatus::Cancelled;
        tracing::info!(offer_id = %offer_id, "offer cancelled");
        Ok(())
    }

    /// Expire offers past their deadline. Idempotent: re-running on an
    /// already-expired book is a no-op. Returns the ids expired this pass.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<OfferId> {
        let offers = self.offers.read().expect("offer map poisoned");
        let mut expired = Vec::new();
        for handle in offers.values() {
            let mut offer = handle.lock().expect("offer lock poisoned");
            if offer.status.is_fillable() && offer.expires_at <= now {
                offer.status = OfferStatus::Expired;
                expired.push(offer.id);
                tracing::info!(offer_id = %offer.id, "offer expired");
            }
        }
        expired
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Snapshot of a single offer.
    pub fn get(&self, offer_id: OfferId) -> Result<Offer> {
        let handle = self.handle(offer_id)?;
        let offer = handle.lock().expect("offer lock poisoned");
        Ok(offer.clone())
    }

    /// Snapshot of every offer currently in the book (any status).
    #[must_use]
    pub fn snapshot(&self) -> Vec<Offer> {
        let offers = self.offers.read().expect("offer map poisoned");
        offers
            .values()
            .map(|h| h.lock().expect("offer lock poisoned").clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offers.read().expect("offer map poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn handle(&self, offer_id: OfferId) -> Result<Arc<Mutex<Offer>>> {
        self.offers
            .read()
            .expect("offer map poisoned")
            .get(&offer_id)
            .cloned()
            .ok_or(PeerdealError::OfferNotFound(offer_id))
    }
}

impl Default for OfferBook {
    fn default() -> Self {
        Self::new()
    }
}
