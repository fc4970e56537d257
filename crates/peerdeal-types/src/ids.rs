//! Globally unique identifiers used throughout PeerDeal.
//!
//! All entity IDs use UUIDv7 for time-ordered lexicographic sorting.
//! [`TradeId`] additionally supports deterministic derivation from the
//! matched offer pair, so a replayed match commit produces the same id.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
        )]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if $prefix.is_empty() {
                    write!(f, "{}", self.0)
                } else {
                    write!(f, "{}:{}", $prefix, self.0)
                }
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a standing buy/sell offer.
    OfferId,
    ""
);
uuid_id!(
    /// Unique identifier for a marketplace user.
    UserId,
    ""
);
uuid_id!(
    /// Unique identifier for an escrow trade.
    TradeId,
    ""
);
uuid_id!(
    /// Unique identifier for a dispute.
    DisputeId,
    "dsp"
);
uuid_id!(
    /// Unique identifier for an insurance policy.
    PolicyId,
    "pol"
);
uuid_id!(
    /// Unique identifier for an insurance claim.
    ClaimId,
    "clm"
);

impl TradeId {
    /// Deterministic `TradeId` from the matched offer pair and fill sequence.
    ///
    /// Replaying the same match commit yields the same id, which makes
    /// downstream settlement naturally idempotent.
    #[must_use]
    pub fn deterministic(maker: OfferId, taker: OfferId, fill_seq: u64) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(b"peerdeal:trade_id:v2:");
        hasher.update(maker.0.as_bytes());
        hasher.update(taker.0.as_bytes());
        hasher.update(fill_seq.to_le_bytes());
        let hash = hasher.finalize();
        let bytes: [u8; 16] = hash[..16].try_into().expect("SHA-256 produces 32 bytes");
        Self(Uuid::from_bytes(bytes))
    }
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// A tradeable token on a specific chain (e.g., USDT on tron).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Market {
    pub token: String,
    pub chain: String,
}

impl Market {
    #[must_use]
    pub fn new(token: impl Into<String>, chain: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            chain: chain.into(),
        }
    }

    #[must_use]
    pub fn symbol(&self) -> String {
        format!("{}@{}", self.token, self.chain)
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.token, self.chain)
    }
}
