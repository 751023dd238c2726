//! Money-moving workflows.
//!
//! Each function loads the records it needs, lets the engine decide, then
//! writes the outcome back: guarded bid/idea updates, ledger movements,
//! investments and notifications. None of them commit. Callers run them on a
//! [`WriteTx`](crate::db::WriteTx) so that either everything lands or nothing
//! does.

use billnet_engine::bid::{self, Acceptance};
use billnet_engine::funding;
use billnet_engine::wallet;
use billnet_engine::{
    Bid, BidId, BidPolicy, BidStatus, BidTerms, Caller, Idea, IdeaId, NotificationKind, Transition,
    Wallet,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::SqliteConnection;
use tracing::info;

use crate::db::notifications::{notify, Subject};
use crate::db::payments::{self, Payment, PaymentStatus};
use crate::db::{bids, ideas, wallets};
use crate::errors::{ApiError, Result};

/// A bid operation as requested over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum BidCommand {
    Place { idea_id: IdeaId, terms: BidTerms },
    Accept { bid_id: BidId },
    Reject { bid_id: BidId },
    Counter { bid_id: BidId, terms: BidTerms },
    AcceptCounter { bid_id: BidId },
    RejectCounter { bid_id: BidId },
}

impl BidCommand {
    /// Stable digest of the request, used to detect idempotency-key reuse.
    pub fn fingerprint(&self) -> Result<String> {
        let encoded = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&encoded)))
    }
}

pub async fn execute(
    conn: &mut SqliteConnection,
    policy: &BidPolicy,
    caller: &Caller,
    command: &BidCommand,
    now: i64,
) -> Result<Bid> {
    match command {
        BidCommand::Place { idea_id, terms } => {
            place_bid(conn, policy, caller, *idea_id, *terms, now).await
        }
        BidCommand::Accept { bid_id } => accept_bid(conn, caller, *bid_id, now).await,
        BidCommand::Reject { bid_id } => reject_bid(conn, caller, *bid_id, now).await,
        BidCommand::Counter { bid_id, terms } => {
            counter_bid(conn, caller, *bid_id, *terms, now).await
        }
        BidCommand::AcceptCounter { bid_id } => accept_counter(conn, caller, *bid_id, now).await,
        BidCommand::RejectCounter { bid_id } => reject_counter(conn, caller, *bid_id, now).await,
    }
}

/// Reserve the bid amount and record a pending bid.
pub async fn place_bid(
    conn: &mut SqliteConnection,
    policy: &BidPolicy,
    caller: &Caller,
    idea_id: IdeaId,
    terms: BidTerms,
    now: i64,
) -> Result<Bid> {
    let idea = ideas::load(conn, idea_id).await?;
    let mut wallet = wallets::load(conn, caller.id).await?;

    let placed = bid::place_bid(policy, caller, &idea, &mut wallet, terms)?;
    let bid = bids::insert(conn, &placed.bid, now).await?;

    let mut reservation = placed.reservation;
    reservation.bid_id = Some(bid.id);
    wallets::record(conn, &[reservation], now).await?;

    notify(
        conn,
        idea.owner_id,
        NotificationKind::BidReceived,
        &format!(
            "New bid of ${} for {} on \"{}\"",
            bid.amount, bid.equity, idea.title
        ),
        Subject::bid(idea.id, bid.id),
        now,
    )
    .await?;

    info!(
        bid_id = bid.id,
        idea_id = idea.id,
        investor_id = caller.id,
        amount = %bid.amount,
        "bid placed"
    );
    Ok(bid)
}

/// Records involved in deciding a bid.
struct Parties {
    bid: Bid,
    idea: Idea,
    investor: Wallet,
    owner: Wallet,
}

async fn load_parties(conn: &mut SqliteConnection, bid_id: BidId) -> Result<Parties> {
    let bid = bids::load(conn, bid_id).await?;
    let idea = ideas::load(conn, bid.idea_id).await?;
    let investor = wallets::load(conn, bid.investor_id).await?;
    let owner = wallets::load(conn, idea.owner_id).await?;
    Ok(Parties {
        bid,
        idea,
        investor,
        owner,
    })
}

pub async fn accept_bid(
    conn: &mut SqliteConnection,
    caller: &Caller,
    bid_id: BidId,
    now: i64,
) -> Result<Bid> {
    let Parties {
        mut bid,
        mut idea,
        mut investor,
        mut owner,
    } = load_parties(conn, bid_id).await?;
    let previous_status = bid.status;
    let previous_idea = idea.clone();

    let acceptance = match bid::accept_bid(caller, &mut bid, &mut idea, &mut investor, &mut owner, now)? {
        Transition::AlreadyApplied => return Ok(bid),
        Transition::Applied(acceptance) => acceptance,
    };
    persist_acceptance(conn, &bid, previous_status, &idea, &previous_idea, &acceptance, now).await?;

    notify(
        conn,
        bid.investor_id,
        NotificationKind::BidAccepted,
        &format!("Your ${} bid on \"{}\" was accepted", bid.amount, idea.title),
        Subject::bid(idea.id, bid.id),
        now,
    )
    .await?;

    info!(bid_id = bid.id, idea_id = idea.id, amount = %bid.amount, "bid accepted");
    Ok(bid)
}

pub async fn reject_bid(
    conn: &mut SqliteConnection,
    caller: &Caller,
    bid_id: BidId,
    now: i64,
) -> Result<Bid> {
    let Parties {
        mut bid,
        idea,
        mut investor,
        ..
    } = load_parties(conn, bid_id).await?;
    let previous_status = bid.status;

    let release = match bid::reject_bid(caller, &mut bid, &idea, &mut investor, now)? {
        Transition::AlreadyApplied => return Ok(bid),
        Transition::Applied(release) => release,
    };
    bids::save_transition(conn, &bid, previous_status).await?;
    wallets::record(conn, &[release], now).await?;

    notify(
        conn,
        bid.investor_id,
        NotificationKind::BidRejected,
        &format!("Your bid on \"{}\" was rejected", idea.title),
        Subject::bid(idea.id, bid.id),
        now,
    )
    .await?;

    info!(bid_id = bid.id, idea_id = idea.id, "bid rejected");
    Ok(bid)
}

pub async fn counter_bid(
    conn: &mut SqliteConnection,
    caller: &Caller,
    bid_id: BidId,
    counter: BidTerms,
    now: i64,
) -> Result<Bid> {
    let mut bid = bids::load(conn, bid_id).await?;
    let idea = ideas::load(conn, bid.idea_id).await?;
    let previous_status = bid.status;

    if let Transition::AlreadyApplied = bid::counter_bid(caller, &mut bid, &idea, counter, now)? {
        return Ok(bid);
    }
    bids::save_transition(conn, &bid, previous_status).await?;

    notify(
        conn,
        bid.investor_id,
        NotificationKind::BidCountered,
        &format!(
            "Counter-offer on \"{}\": ${} for {}",
            idea.title, counter.amount, counter.equity
        ),
        Subject::bid(idea.id, bid.id),
        now,
    )
    .await?;

    info!(
        bid_id = bid.id,
        idea_id = idea.id,
        counter_amount = %counter.amount,
        "bid countered"
    );
    Ok(bid)
}

pub async fn accept_counter(
    conn: &mut SqliteConnection,
    caller: &Caller,
    bid_id: BidId,
    now: i64,
) -> Result<Bid> {
    let Parties {
        mut bid,
        mut idea,
        mut investor,
        mut owner,
    } = load_parties(conn, bid_id).await?;
    let previous_status = bid.status;
    let previous_idea = idea.clone();

    let acceptance =
        match bid::accept_counter(caller, &mut bid, &mut idea, &mut investor, &mut owner, now)? {
            Transition::AlreadyApplied => return Ok(bid),
            Transition::Applied(acceptance) => acceptance,
        };
    persist_acceptance(conn, &bid, previous_status, &idea, &previous_idea, &acceptance, now).await?;

    notify(
        conn,
        idea.owner_id,
        NotificationKind::CounterAccepted,
        &format!(
            "Your counter-offer on \"{}\" was accepted: ${} received",
            idea.title, acceptance.investment.amount
        ),
        Subject::bid(idea.id, bid.id),
        now,
    )
    .await?;

    info!(
        bid_id = bid.id,
        idea_id = idea.id,
        amount = %acceptance.investment.amount,
        "counter-offer accepted"
    );
    Ok(bid)
}

pub async fn reject_counter(
    conn: &mut SqliteConnection,
    caller: &Caller,
    bid_id: BidId,
    now: i64,
) -> Result<Bid> {
    let mut bid = bids::load(conn, bid_id).await?;
    let idea = ideas::load(conn, bid.idea_id).await?;
    let mut investor = wallets::load(conn, bid.investor_id).await?;
    let previous_status = bid.status;

    let release = match bid::reject_counter(caller, &mut bid, &mut investor, now)? {
        Transition::AlreadyApplied => return Ok(bid),
        Transition::Applied(release) => release,
    };
    bids::save_transition(conn, &bid, previous_status).await?;
    wallets::record(conn, &[release], now).await?;

    notify(
        conn,
        idea.owner_id,
        NotificationKind::CounterRejected,
        &format!("Your counter-offer on \"{}\" was declined", idea.title),
        Subject::bid(idea.id, bid.id),
        now,
    )
    .await?;

    info!(bid_id = bid.id, idea_id = idea.id, "counter-offer rejected");
    Ok(bid)
}

async fn persist_acceptance(
    conn: &mut SqliteConnection,
    bid: &Bid,
    previous_status: BidStatus,
    idea: &Idea,
    previous_idea: &Idea,
    acceptance: &Acceptance,
    now: i64,
) -> Result<()> {
    bids::save_transition(conn, bid, previous_status).await?;
    ideas::save(conn, idea, previous_idea).await?;
    wallets::record(conn, &acceptance.movements, now).await?;
    let investment = bids::insert_investment(conn, &acceptance.investment, now).await?;

    info!(
        investment_id = investment.id,
        idea_id = idea.id,
        current_funding = %idea.current_funding,
        funding_goal = %idea.funding_goal,
        "investment recorded"
    );

    if acceptance.idea_funded {
        notify(
            conn,
            idea.owner_id,
            NotificationKind::IdeaFunded,
            &format!("\"{}\" reached its ${} funding goal", idea.title, idea.funding_goal),
            Subject::idea(idea.id),
            now,
        )
        .await?;
        info!(idea_id = idea.id, "idea funded");
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Idea lifecycle
// ─────────────────────────────────────────────────────────

/// Owner closes an idea; every open bid on it is released.
pub async fn close_idea(
    conn: &mut SqliteConnection,
    caller: &Caller,
    idea_id: IdeaId,
    now: i64,
) -> Result<Idea> {
    let mut idea = ideas::load(conn, idea_id).await?;
    let previous = idea.clone();

    if let Transition::AlreadyApplied = funding::close_idea(caller, &mut idea, now)? {
        return Ok(idea);
    }
    ideas::save(conn, &idea, &previous).await?;
    let released = release_open_bids(conn, &idea, now).await?;

    info!(idea_id = idea.id, released, "idea closed");
    Ok(idea)
}

/// Owner deletes an idea that never took money.
pub async fn delete_idea(
    conn: &mut SqliteConnection,
    caller: &Caller,
    idea_id: IdeaId,
    now: i64,
) -> Result<()> {
    let idea = ideas::load(conn, idea_id).await?;
    let investments = bids::count_investments(conn, idea.id).await?;
    funding::ensure_deletable(caller, &idea, investments)?;

    let released = release_open_bids(conn, &idea, now).await?;
    ideas::delete(conn, idea.id).await?;

    info!(idea_id = idea.id, released, "idea deleted");
    Ok(())
}

/// Reject every open bid on `idea` and hand the reservations back.
async fn release_open_bids(conn: &mut SqliteConnection, idea: &Idea, now: i64) -> Result<usize> {
    let open = bids::list_open_for_idea(conn, idea.id).await?;
    let mut released = 0;

    for mut bid in open {
        let previous_status = bid.status;
        let mut investor = wallets::load(conn, bid.investor_id).await?;
        let Some(release) = bid::cancel_open_bid(&mut bid, &mut investor, now)? else {
            continue;
        };
        bids::save_transition(conn, &bid, previous_status).await?;
        wallets::record(conn, &[release], now).await?;
        notify(
            conn,
            bid.investor_id,
            NotificationKind::BidRejected,
            &format!(
                "\"{}\" is no longer available; your bid was released",
                idea.title
            ),
            Subject::bid(idea.id, bid.id),
            now,
        )
        .await?;
        released += 1;
    }
    Ok(released)
}

// ─────────────────────────────────────────────────────────
// Wallet funding
// ─────────────────────────────────────────────────────────

/// Credit a pending payment to its owner's wallet.
pub async fn confirm_payment(
    conn: &mut SqliteConnection,
    payment_id: i64,
    now: i64,
) -> Result<Payment> {
    let payment = payments::load(conn, payment_id).await?;
    if payment.status == PaymentStatus::Confirmed {
        return Err(ApiError::Conflict(format!(
            "payment {} is already confirmed",
            payment.id
        )));
    }
    let mut wallet = wallets::load(conn, payment.user_id).await?;

    let deposit = wallet::deposit(&mut wallet, payment.amount)?;
    payments::mark_confirmed(conn, payment.id, now).await?;
    wallets::record(conn, &[deposit], now).await?;

    notify(
        conn,
        payment.user_id,
        NotificationKind::PaymentConfirmed,
        &format!(
            "Your payment {} was confirmed; ${} added to your wallet",
            payment.reference, payment.amount
        ),
        Subject::default(),
        now,
    )
    .await?;

    info!(
        payment_id = payment.id,
        user_id = payment.user_id,
        amount = %payment.amount,
        "payment confirmed"
    );
    payments::load(conn, payment.id).await
}
