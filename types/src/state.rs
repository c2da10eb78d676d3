//! State enums for transactions and wallets.

use serde::{Deserialize, Serialize};

use crate::TypesError;

/// Which side of a transaction a view is written for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// The tracked wallet spent funds (matched on the input side).
    Outgoing,
    /// The tracked wallet received funds (matched on the output side).
    Incoming,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
        }
    }
}

/// Confirmation status of a directional transaction view.
///
/// Serialized as the integer wire code clients already understand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum TxStatus {
    AppearedInMempoolIncoming,
    AppearedInBlockIncoming,
    AppearedInMempoolOutgoing,
    AppearedInBlockOutgoing,
    InBlockConfirmedIncoming,
    InBlockConfirmedOutgoing,
}

impl TxStatus {
    /// Seen only in the mempool.
    pub fn mempool(direction: Direction) -> Self {
        match direction {
            Direction::Incoming => Self::AppearedInMempoolIncoming,
            Direction::Outgoing => Self::AppearedInMempoolOutgoing,
        }
    }

    /// Included in a block without enough confirmations on top.
    pub fn in_block(direction: Direction) -> Self {
        match direction {
            Direction::Incoming => Self::AppearedInBlockIncoming,
            Direction::Outgoing => Self::AppearedInBlockOutgoing,
        }
    }

    /// Included in a block with at least the required confirmations.
    pub fn confirmed(direction: Direction) -> Self {
        match direction {
            Direction::Incoming => Self::InBlockConfirmedIncoming,
            Direction::Outgoing => Self::InBlockConfirmedOutgoing,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::AppearedInMempoolIncoming
            | Self::AppearedInBlockIncoming
            | Self::InBlockConfirmedIncoming => Direction::Incoming,
            Self::AppearedInMempoolOutgoing
            | Self::AppearedInBlockOutgoing
            | Self::InBlockConfirmedOutgoing => Direction::Outgoing,
        }
    }

    /// Whether the transaction is still waiting for a block.
    pub fn is_mempool(&self) -> bool {
        matches!(
            self,
            Self::AppearedInMempoolIncoming | Self::AppearedInMempoolOutgoing
        )
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(
            self,
            Self::InBlockConfirmedIncoming | Self::InBlockConfirmedOutgoing
        )
    }

    /// Integer code carried on the wire and in notifications.
    pub fn code(&self) -> u8 {
        match self {
            Self::AppearedInMempoolIncoming => 1,
            Self::AppearedInBlockIncoming => 2,
            Self::AppearedInMempoolOutgoing => 3,
            Self::AppearedInBlockOutgoing => 4,
            Self::InBlockConfirmedIncoming => 5,
            Self::InBlockConfirmedOutgoing => 6,
        }
    }
}

impl From<TxStatus> for u8 {
    fn from(status: TxStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for TxStatus {
    type Error = TypesError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::AppearedInMempoolIncoming),
            2 => Ok(Self::AppearedInBlockIncoming),
            3 => Ok(Self::AppearedInMempoolOutgoing),
            4 => Ok(Self::AppearedInBlockOutgoing),
            5 => Ok(Self::InBlockConfirmedIncoming),
            6 => Ok(Self::InBlockConfirmedOutgoing),
            other => Err(TypesError::UnknownStatusCode(other)),
        }
    }
}

/// Lifecycle status of a tracked wallet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    /// Created but never funded.
    #[default]
    Created,
    /// Has received funds at least once.
    Active,
    /// Hidden by the user; still tracked.
    Deleted,
}
