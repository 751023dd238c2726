//! # BillNet engine
//!
//! Domain rules of the BillNet marketplace: the bid state machine, the wallet
//! ledger and the idea funding aggregate. The crate performs no I/O. Callers
//! load the affected records, invoke an operation, and persist the mutated
//! records plus the returned ledger movements in one transaction.
//!
//! | Phase        | Operation(s)                                      |
//! |--------------|---------------------------------------------------|
//! | Funding      | [`wallet::deposit`]                               |
//! | Publishing   | [`funding::authorize_publish`], [`funding::apply_update`] |
//! | Bidding      | [`bid::place_bid`]                                |
//! | Decision     | [`bid::accept_bid`], [`bid::reject_bid`], [`bid::counter_bid`] |
//! | Counter      | [`bid::accept_counter`], [`bid::reject_counter`]  |
//! | Closing      | [`funding::close_idea`], [`bid::cancel_open_bid`] |

#[macro_use]
mod macros;

pub mod bid;
pub mod events;
pub mod funding;
pub mod types;
pub mod wallet;

#[cfg(test)]
mod test_bidding;
#[cfg(test)]
mod test_ledger;

use thiserror::Error;

pub use bid::{BidAction, BidPolicy};
pub use events::{LedgerEntryKind, LedgerMovement, NotificationKind};
pub use types::{
    Amount, Bid, BidId, BidStatus, BidTerms, Caller, Equity, Idea, IdeaId, IdeaStatus, Investment,
    InvestmentId, InvestmentStatus, PostType, Role, UserId, Wallet,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{0}")]
    InvalidAmount(&'static str),

    #[error("{0}")]
    InvalidEquity(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("amount out of range")]
    AmountOutOfRange,

    #[error("insufficient funds: {available} available, {requested} requested")]
    InsufficientFunds { available: Amount, requested: Amount },

    #[error("wallet balance {balance} is below the {minimum} minimum required to bid")]
    BelowMinimumBalance { balance: Amount, minimum: Amount },

    #[error("you cannot bid on your own idea")]
    SelfBid,

    #[error("{0}")]
    NotAuthorized(&'static str),

    #[error("this action requires the {0} role")]
    RoleRequired(Role),

    #[error("idea is {0} and not open for this action")]
    IdeaNotOpen(IdeaStatus),

    #[error("idea {0} has investments and cannot be deleted")]
    IdeaHasInvestments(IdeaId),

    #[error("cannot {action} a bid that is {status}")]
    InvalidTransition { status: BidStatus, action: BidAction },

    #[error("user {user_id} has {reserved} reserved, cannot settle {requested}")]
    ReservationMismatch {
        user_id: UserId,
        reserved: Amount,
        requested: Amount,
    },

    #[error("cannot transfer funds to the same wallet")]
    SelfTransfer,

    #[error("inconsistent records: {0}")]
    Inconsistent(&'static str),

    #[error("unknown {kind} value: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a state transition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition<T> {
    /// The transition happened now; `T` carries its side effects.
    Applied(T),
    /// The record was already in the requested state. Nothing changed.
    AlreadyApplied,
}

impl<T> Transition<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Transition::Applied(value) => Some(value),
            Transition::AlreadyApplied => None,
        }
    }
}
