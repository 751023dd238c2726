//! # Types
//!
//! Shared data structures used across the engine.
//!
//! ## Money
//!
//! [`Amount`] is an integer count of cents. It crosses the wire as a decimal
//! string with two fractional digits (`"12000.00"`) and accepts either a JSON
//! number or a string on input, as long as it carries no more than two
//! fractional digits. [`Equity`] is a percentage held in basis points
//! (`500` = 5%) and uses the same decimal representation.
//!
//! ## Bid status as a finite-state machine
//!
//! ```text
//! Pending ──► Accepted
//!    │  └───► Rejected
//!    └──► Countered ──► Accepted
//!               └─────► Rejected
//! ```
//!
//! `Accepted` and `Rejected` are terminal. Nothing ever returns to `Pending`.

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Error, Result};

pub type UserId = i64;
pub type IdeaId = i64;
pub type BidId = i64;
pub type InvestmentId = i64;

// ── Money ────────────────────────────────────────────────────────────

/// A non-fractional count of cents.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    /// Whole-dollar constructor, mostly for configuration and tests.
    pub const fn from_dollars(dollars: i64) -> Self {
        Amount(dollars * 100)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Amount) -> Result<Amount> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or(Error::AmountOutOfRange)
    }

    pub fn checked_sub(self, other: Amount) -> Result<Amount> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or(Error::AmountOutOfRange)
    }

    /// Convert a decimal currency value into cents.
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        let value = value.normalize();
        if value.scale() > 2 {
            return Err(Error::InvalidAmount(
                "amounts support at most two decimal places",
            ));
        }
        value
            .checked_mul(Decimal::from(100))
            .and_then(|cents| cents.to_i64())
            .map(Amount)
            .ok_or(Error::AmountOutOfRange)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        Serialize::serialize(&self.to_decimal(), serializer)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Amount::from_decimal(value).map_err(serde::de::Error::custom)
    }
}

/// An equity share in basis points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Equity(u32);

impl Equity {
    /// 100%.
    pub const MAX: Equity = Equity(10_000);

    pub const fn from_basis_points(bps: u32) -> Self {
        Equity(bps)
    }

    /// Whole-percent constructor.
    pub const fn from_percent(percent: u32) -> Self {
        Equity(percent * 100)
    }

    pub const fn basis_points(self) -> u32 {
        self.0
    }

    /// True for a share strictly above 0% and at most 100%.
    pub fn is_valid_share(self) -> bool {
        self.0 > 0 && self <= Self::MAX
    }

    /// Convert a decimal percentage (`5.25`) into basis points.
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        let value = value.normalize();
        if value.scale() > 2 {
            return Err(Error::InvalidEquity(
                "equity supports at most two decimal places",
            ));
        }
        if value.is_sign_negative() && !value.is_zero() {
            return Err(Error::InvalidEquity("equity must be greater than zero"));
        }
        value
            .checked_mul(Decimal::from(100))
            .and_then(|bps| bps.to_u32())
            .map(Equity)
            .ok_or(Error::InvalidEquity("equity must be at most 100"))
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(i64::from(self.0), 2)
    }
}

impl fmt::Display for Equity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.to_decimal())
    }
}

impl Serialize for Equity {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        Serialize::serialize(&self.to_decimal(), serializer)
    }
}

impl<'de> Deserialize<'de> for Equity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Equity::from_decimal(value).map_err(serde::de::Error::custom)
    }
}

// ── Enumerations ─────────────────────────────────────────────────────

text_enum! {
    /// Marketplace role chosen during onboarding.
    pub enum Role {
        Entrepreneur => "entrepreneur",
        Investor => "investor",
        /// Operators: certification review and payment confirmation.
        Admin => "admin",
    }
}

text_enum! {
    /// The three kinds of post an entrepreneur can publish.
    pub enum PostType {
        Idea => "idea",
        Business => "business",
        /// An equity offering; carries its own `equityPercentage`.
        Share => "share",
    }
}

text_enum! {
    /// Lifecycle status of an idea.
    pub enum IdeaStatus {
        /// Open to new bids.
        Active => "active",
        /// Funding goal reached; closed to new bids.
        Funded => "funded",
        /// Closed by its owner.
        Closed => "closed",
    }
}

text_enum! {
    pub enum BidStatus {
        Pending => "pending",
        /// Entrepreneur proposed new terms; the investor decides next.
        Countered => "countered",
        Accepted => "accepted",
        Rejected => "rejected",
    }
}

impl BidStatus {
    /// Accepted and rejected bids never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, BidStatus::Accepted | BidStatus::Rejected)
    }

    /// Open bids hold a reservation against the investor's wallet.
    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }

    /// Whether `self -> to` is an edge of the bid state machine.
    pub fn can_transition_to(self, to: BidStatus) -> bool {
        matches!(
            (self, to),
            (BidStatus::Pending, BidStatus::Accepted)
                | (BidStatus::Pending, BidStatus::Rejected)
                | (BidStatus::Pending, BidStatus::Countered)
                | (BidStatus::Countered, BidStatus::Accepted)
                | (BidStatus::Countered, BidStatus::Rejected)
        )
    }
}

text_enum! {
    pub enum InvestmentStatus {
        Pending => "pending",
        Completed => "completed",
        Cancelled => "cancelled",
    }
}

// ── Aggregates ───────────────────────────────────────────────────────

/// Who is performing an operation, as established by the session layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    pub id: UserId,
    pub role: Option<Role>,
}

impl Caller {
    pub fn new(id: UserId, role: Option<Role>) -> Self {
        Self { id, role }
    }

    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.role == Some(role) {
            Ok(())
        } else {
            Err(Error::RoleRequired(role))
        }
    }
}

/// A user's funds, split into spendable and earmarked portions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub user_id: UserId,
    /// Spendable funds.
    pub available: Amount,
    /// Funds held against open bids.
    pub reserved: Amount,
}

impl Wallet {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            available: Amount::ZERO,
            reserved: Amount::ZERO,
        }
    }

    /// Nominal balance: everything the user owns, earmarked or not.
    pub fn total(&self) -> Result<Amount> {
        self.available.checked_add(self.reserved)
    }
}

/// Amount and equity offered for an idea.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidTerms {
    pub amount: Amount,
    pub equity: Equity,
}

impl BidTerms {
    pub fn new(amount: Amount, equity: Equity) -> Self {
        Self { amount, equity }
    }

    /// Amount strictly positive, equity in (0, 100].
    pub fn validate(&self) -> Result<()> {
        if !self.amount.is_positive() {
            return Err(Error::InvalidAmount("amount must be greater than zero"));
        }
        if !self.equity.is_valid_share() {
            return Err(Error::InvalidEquity(
                "equity must be greater than 0 and at most 100",
            ));
        }
        Ok(())
    }
}

/// An entrepreneur's funding request, business sale, or share offering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Idea {
    pub id: IdeaId,
    #[serde(rename = "userId")]
    pub owner_id: UserId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub post_type: PostType,
    pub funding_goal: Amount,
    pub current_funding: Amount,
    /// Offered share; only present on `share` posts.
    pub equity_percentage: Option<Equity>,
    pub status: IdeaStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: BidId,
    pub idea_id: IdeaId,
    pub investor_id: UserId,
    #[serde(rename = "bidAmount")]
    pub amount: Amount,
    #[serde(rename = "equityPercentage")]
    pub equity: Equity,
    pub counter_amount: Option<Amount>,
    pub counter_equity: Option<Equity>,
    /// Funds currently held for this bid; zero once it resolves.
    #[serde(rename = "reservedAmount")]
    pub reserved: Amount,
    pub status: BidStatus,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Bid {
    pub fn terms(&self) -> BidTerms {
        BidTerms::new(self.amount, self.equity)
    }

    pub fn counter_terms(&self) -> Option<BidTerms> {
        match (self.counter_amount, self.counter_equity) {
            (Some(amount), Some(equity)) => Some(BidTerms::new(amount, equity)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    pub id: InvestmentId,
    pub idea_id: IdeaId,
    pub investor_id: UserId,
    pub bid_id: BidId,
    pub amount: Amount,
    #[serde(rename = "equityPercentage")]
    pub equity: Equity,
    pub status: InvestmentStatus,
    pub created_at: i64,
}
