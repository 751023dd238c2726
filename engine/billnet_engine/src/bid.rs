//! # Bid engine
//!
//! The authoritative bid state machine. Every operation checks the caller,
//! the current status and the terms before touching anything, then applies
//! the status change together with its wallet side effect. Wallet and idea
//! changes are computed on copies and committed only when every step
//! succeeded, so a failed call leaves all arguments as they were.
//!
//! Repeating a transition that already happened (accepting an accepted bid,
//! rejecting a rejected one) yields [`Transition::AlreadyApplied`] and moves
//! no money.

use crate::events::LedgerMovement;
use crate::funding::{apply_investment, ensure_open_for_bids, ensure_owner};
use crate::types::{
    Amount, Bid, BidId, BidStatus, BidTerms, Caller, Equity, Idea, IdeaId, IdeaStatus,
    InvestmentStatus, Role, UserId, Wallet,
};
use crate::wallet;
use crate::{Error, Result, Transition};

text_enum! {
    /// Decisions that move a bid along its state machine.
    pub enum BidAction {
        Accept => "accept",
        Reject => "reject",
        Counter => "counter",
        AcceptCounter => "accept_counter",
        RejectCounter => "reject_counter",
    }
}

/// Marketplace rules applied when placing a bid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BidPolicy {
    /// Nominal wallet balance an investor must hold before bidding at all.
    pub min_wallet_balance: Amount,
}

impl Default for BidPolicy {
    fn default() -> Self {
        Self {
            min_wallet_balance: Amount::from_dollars(10_000),
        }
    }
}

/// A validated bid that has not been assigned an id yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBid {
    pub idea_id: IdeaId,
    pub investor_id: UserId,
    pub terms: BidTerms,
    pub reserved: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedBid {
    pub bid: NewBid,
    pub reservation: LedgerMovement,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewInvestment {
    pub idea_id: IdeaId,
    pub investor_id: UserId,
    pub bid_id: BidId,
    pub amount: Amount,
    pub equity: Equity,
    pub status: InvestmentStatus,
}

/// Everything an acceptance produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acceptance {
    pub investment: NewInvestment,
    pub movements: Vec<LedgerMovement>,
    /// The idea reached its funding goal with this acceptance.
    pub idea_funded: bool,
}

/// Validate a new bid and reserve its amount from the investor's wallet.
pub fn place_bid(
    policy: &BidPolicy,
    caller: &Caller,
    idea: &Idea,
    investor_wallet: &mut Wallet,
    terms: BidTerms,
) -> Result<PlacedBid> {
    if caller.id == idea.owner_id {
        return Err(Error::SelfBid);
    }
    caller.require_role(Role::Investor)?;
    if investor_wallet.user_id != caller.id {
        return Err(Error::Inconsistent("wallet does not belong to the bidder"));
    }
    ensure_open_for_bids(idea)?;
    terms.validate()?;

    let balance = investor_wallet.total()?;
    if balance < policy.min_wallet_balance {
        return Err(Error::BelowMinimumBalance {
            balance,
            minimum: policy.min_wallet_balance,
        });
    }

    let reservation = wallet::reserve(investor_wallet, terms.amount, None)?;
    Ok(PlacedBid {
        bid: NewBid {
            idea_id: idea.id,
            investor_id: caller.id,
            terms,
            reserved: terms.amount,
        },
        reservation,
    })
}

/// Owner accepts a pending bid: funds move to the owner and an investment
/// is recorded at the bid's terms.
pub fn accept_bid(
    caller: &Caller,
    bid: &mut Bid,
    idea: &mut Idea,
    investor_wallet: &mut Wallet,
    owner_wallet: &mut Wallet,
    now: i64,
) -> Result<Transition<Acceptance>> {
    check_pairing(bid, idea)?;
    ensure_owner(caller, idea)?;
    match bid.status {
        BidStatus::Accepted => return Ok(Transition::AlreadyApplied),
        BidStatus::Pending => {}
        status => {
            return Err(Error::InvalidTransition {
                status,
                action: BidAction::Accept,
            })
        }
    }
    ensure_not_closed(idea)?;

    let terms = bid.terms();
    let mut investor = investor_wallet.clone();
    let mut owner = owner_wallet.clone();
    let mut next_idea = idea.clone();
    let acceptance = settle(bid, &mut next_idea, &mut investor, &mut owner, terms, Vec::new(), now)?;

    *investor_wallet = investor;
    *owner_wallet = owner;
    *idea = next_idea;
    commit_status(bid, BidStatus::Accepted, now);
    Ok(Transition::Applied(acceptance))
}

/// Owner rejects a pending bid; the reservation goes back to the investor.
pub fn reject_bid(
    caller: &Caller,
    bid: &mut Bid,
    idea: &Idea,
    investor_wallet: &mut Wallet,
    now: i64,
) -> Result<Transition<LedgerMovement>> {
    check_pairing(bid, idea)?;
    ensure_owner(caller, idea)?;
    match bid.status {
        BidStatus::Rejected => return Ok(Transition::AlreadyApplied),
        BidStatus::Pending => {}
        status => {
            return Err(Error::InvalidTransition {
                status,
                action: BidAction::Reject,
            })
        }
    }
    let movement = release_reservation(bid, investor_wallet)?;
    commit_status(bid, BidStatus::Rejected, now);
    Ok(Transition::Applied(movement))
}

/// Owner proposes new terms. The original reservation stays held until the
/// investor resolves the counter-offer.
pub fn counter_bid(
    caller: &Caller,
    bid: &mut Bid,
    idea: &Idea,
    counter: BidTerms,
    now: i64,
) -> Result<Transition<()>> {
    check_pairing(bid, idea)?;
    ensure_owner(caller, idea)?;
    match bid.status {
        BidStatus::Countered if bid.counter_terms() == Some(counter) => {
            return Ok(Transition::AlreadyApplied)
        }
        BidStatus::Pending => {}
        status => {
            return Err(Error::InvalidTransition {
                status,
                action: BidAction::Counter,
            })
        }
    }
    ensure_not_closed(idea)?;
    counter.validate()?;

    bid.counter_amount = Some(counter.amount);
    bid.counter_equity = Some(counter.equity);
    commit_status(bid, BidStatus::Countered, now);
    Ok(Transition::Applied(()))
}

/// Investor takes the counter-offer. The reservation is re-sized to the
/// counter amount, then the bid settles at the counter terms.
pub fn accept_counter(
    caller: &Caller,
    bid: &mut Bid,
    idea: &mut Idea,
    investor_wallet: &mut Wallet,
    owner_wallet: &mut Wallet,
    now: i64,
) -> Result<Transition<Acceptance>> {
    check_pairing(bid, idea)?;
    ensure_bidder(caller, bid)?;
    match bid.status {
        BidStatus::Accepted => return Ok(Transition::AlreadyApplied),
        BidStatus::Countered => {}
        status => {
            return Err(Error::InvalidTransition {
                status,
                action: BidAction::AcceptCounter,
            })
        }
    }
    ensure_not_closed(idea)?;
    let counter = bid
        .counter_terms()
        .ok_or(Error::Inconsistent("countered bid has no counter terms"))?;

    let mut investor = investor_wallet.clone();
    let mut owner = owner_wallet.clone();
    let mut next_idea = idea.clone();
    let mut next_bid = bid.clone();

    let mut movements = Vec::new();
    if let Some(adjustment) =
        wallet::resize_reservation(&mut investor, next_bid.reserved, counter.amount, Some(bid.id))?
    {
        movements.push(adjustment);
    }
    next_bid.reserved = counter.amount;
    let acceptance = settle(
        &mut next_bid,
        &mut next_idea,
        &mut investor,
        &mut owner,
        counter,
        movements,
        now,
    )?;

    *investor_wallet = investor;
    *owner_wallet = owner;
    *idea = next_idea;
    *bid = next_bid;
    commit_status(bid, BidStatus::Accepted, now);
    Ok(Transition::Applied(acceptance))
}

/// Investor declines the counter-offer; the reservation is released.
pub fn reject_counter(
    caller: &Caller,
    bid: &mut Bid,
    investor_wallet: &mut Wallet,
    now: i64,
) -> Result<Transition<LedgerMovement>> {
    ensure_bidder(caller, bid)?;
    match bid.status {
        BidStatus::Rejected => return Ok(Transition::AlreadyApplied),
        BidStatus::Countered => {}
        status => {
            return Err(Error::InvalidTransition {
                status,
                action: BidAction::RejectCounter,
            })
        }
    }
    let movement = release_reservation(bid, investor_wallet)?;
    commit_status(bid, BidStatus::Rejected, now);
    Ok(Transition::Applied(movement))
}

/// Resolve an open bid whose idea is being closed or deleted.
///
/// Returns `None` for bids that were already resolved.
pub fn cancel_open_bid(bid: &mut Bid, investor_wallet: &mut Wallet, now: i64) -> Result<Option<LedgerMovement>> {
    if bid.status.is_terminal() {
        return Ok(None);
    }
    let movement = release_reservation(bid, investor_wallet)?;
    commit_status(bid, BidStatus::Rejected, now);
    Ok(Some(movement))
}

fn check_pairing(bid: &Bid, idea: &Idea) -> Result<()> {
    if bid.idea_id == idea.id {
        Ok(())
    } else {
        Err(Error::Inconsistent("bid does not belong to this idea"))
    }
}

fn ensure_bidder(caller: &Caller, bid: &Bid) -> Result<()> {
    if caller.id == bid.investor_id {
        Ok(())
    } else {
        Err(Error::NotAuthorized(
            "only the bidding investor can respond to a counter-offer",
        ))
    }
}

fn ensure_not_closed(idea: &Idea) -> Result<()> {
    if idea.status == IdeaStatus::Closed {
        Err(Error::IdeaNotOpen(idea.status))
    } else {
        Ok(())
    }
}

fn release_reservation(bid: &mut Bid, investor_wallet: &mut Wallet) -> Result<LedgerMovement> {
    if investor_wallet.user_id != bid.investor_id {
        return Err(Error::Inconsistent("wallet does not belong to the bidder"));
    }
    let movement = wallet::release(investor_wallet, bid.reserved, Some(bid.id))?;
    bid.reserved = Amount::ZERO;
    Ok(movement)
}

/// Transfer the held funds at `terms` and record the investment.
fn settle(
    bid: &mut Bid,
    idea: &mut Idea,
    investor: &mut Wallet,
    owner: &mut Wallet,
    terms: BidTerms,
    mut movements: Vec<LedgerMovement>,
    now: i64,
) -> Result<Acceptance> {
    if investor.user_id != bid.investor_id || owner.user_id != idea.owner_id {
        return Err(Error::Inconsistent("wallets do not match the bid parties"));
    }
    if bid.reserved != terms.amount {
        return Err(Error::ReservationMismatch {
            user_id: bid.investor_id,
            reserved: bid.reserved,
            requested: terms.amount,
        });
    }

    movements.extend(wallet::transfer(investor, owner, terms.amount, Some(bid.id))?);
    let idea_funded = apply_investment(idea, terms.amount, now)?;
    bid.reserved = Amount::ZERO;

    Ok(Acceptance {
        investment: NewInvestment {
            idea_id: idea.id,
            investor_id: bid.investor_id,
            bid_id: bid.id,
            amount: terms.amount,
            equity: terms.equity,
            status: InvestmentStatus::Completed,
        },
        movements,
        idea_funded,
    })
}

fn commit_status(bid: &mut Bid, to: BidStatus, now: i64) {
    debug_assert!(bid.status.can_transition_to(to));
    bid.status = to;
    bid.updated_at = now;
}
