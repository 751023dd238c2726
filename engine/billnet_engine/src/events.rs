//! Records produced as side effects of engine operations.
//!
//! Every balance change yields one or more [`LedgerMovement`]s, which the
//! service appends to its ledger table. Bid transitions also name the
//! [`NotificationKind`] that the counterparty should receive.

use serde::{Deserialize, Serialize};

use crate::types::{Amount, BidId, UserId};

text_enum! {
    /// All recognised ledger entry kinds.
    pub enum LedgerEntryKind {
        /// External funds credited to available balance.
        Deposit => "deposit",
        /// Available → reserved, held for a bid.
        Reserve => "reserve",
        /// Reserved → available, bid resolved without a transfer.
        Release => "release",
        /// Reserved funds leaving the investor on acceptance.
        TransferOut => "transfer_out",
        /// Funds arriving at the idea owner on acceptance.
        TransferIn => "transfer_in",
    }
}

text_enum! {
    /// Notification kinds the marketplace emits.
    pub enum NotificationKind {
        BidReceived => "bid_received",
        BidAccepted => "bid_accepted",
        BidRejected => "bid_rejected",
        BidCountered => "bid_countered",
        CounterAccepted => "counter_accepted",
        CounterRejected => "counter_rejected",
        IdeaFunded => "idea_funded",
        NewComment => "new_comment",
        NewFollower => "new_follower",
        NewMessage => "new_message",
        VerificationDecided => "verification_decided",
        PaymentConfirmed => "payment_confirmed",
    }
}

/// One side of a balance change, ready to be appended to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerMovement {
    pub user_id: UserId,
    pub kind: LedgerEntryKind,
    pub amount: Amount,
    /// Unset for reservations made before the bid row exists; the caller
    /// fills it in once the bid id is known.
    pub bid_id: Option<BidId>,
}

impl LedgerMovement {
    pub fn new(user_id: UserId, kind: LedgerEntryKind, amount: Amount, bid_id: Option<BidId>) -> Self {
        Self {
            user_id,
            kind,
            amount,
            bid_id,
        }
    }

    /// Signed effect of this movement on the user's available balance.
    pub fn available_delta(&self) -> i64 {
        match self.kind {
            LedgerEntryKind::Deposit | LedgerEntryKind::Release | LedgerEntryKind::TransferIn => {
                self.amount.cents()
            }
            LedgerEntryKind::Reserve => -self.amount.cents(),
            LedgerEntryKind::TransferOut => 0,
        }
    }

    /// Signed effect of this movement on the user's reserved balance.
    pub fn reserved_delta(&self) -> i64 {
        match self.kind {
            LedgerEntryKind::Reserve => self.amount.cents(),
            LedgerEntryKind::Release | LedgerEntryKind::TransferOut => -self.amount.cents(),
            LedgerEntryKind::Deposit | LedgerEntryKind::TransferIn => 0,
        }
    }
}
