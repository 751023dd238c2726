//! # Idea funding aggregate
//!
//! Keeps `current_funding` equal to the sum of accepted amounts and flips an
//! idea to [`IdeaStatus::Funded`] once it reaches its goal. Funding is not
//! capped at the goal: an acceptance that overshoots is recorded in full.
//!
//! Idea status lifecycle:
//!
//! ```text
//! Active ──► Funded ──► Closed
//!    └─────────────────►┘
//! ```

use serde::Deserialize;

use crate::types::{Amount, Caller, Equity, Idea, IdeaStatus, PostType, Role};
use crate::{Error, Result, Transition};

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 20_000;

/// Fields supplied when publishing an idea.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaDraft {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub post_type: PostType,
    pub funding_goal: Amount,
    #[serde(default)]
    pub equity_percentage: Option<Equity>,
}

impl IdeaDraft {
    pub fn validate(&self) -> Result<()> {
        validate_fields(
            &self.title,
            &self.description,
            self.post_type,
            self.funding_goal,
            self.equity_percentage,
        )
    }
}

/// Partial update of an idea; absent fields stay unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdeaUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub funding_goal: Option<Amount>,
    pub equity_percentage: Option<Equity>,
}

fn validate_fields(
    title: &str,
    description: &str,
    post_type: PostType,
    funding_goal: Amount,
    equity: Option<Equity>,
) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::Validation("title is required".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(Error::Validation(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    if description.trim().is_empty() {
        return Err(Error::Validation("description is required".into()));
    }
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(Error::Validation(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    if !funding_goal.is_positive() {
        return Err(Error::InvalidAmount("fundingGoal must be greater than zero"));
    }
    match (post_type, equity) {
        (PostType::Share, Some(equity)) if equity.is_valid_share() => Ok(()),
        (PostType::Share, Some(_)) => Err(Error::InvalidEquity(
            "equityPercentage must be greater than 0 and at most 100",
        )),
        (PostType::Share, None) => Err(Error::InvalidEquity(
            "share posts require an equityPercentage",
        )),
        (_, Some(_)) => Err(Error::InvalidEquity(
            "equityPercentage is only allowed on share posts",
        )),
        (_, None) => Ok(()),
    }
}

/// Only entrepreneurs publish ideas.
pub fn authorize_publish(caller: &Caller, draft: &IdeaDraft) -> Result<()> {
    caller.require_role(Role::Entrepreneur)?;
    draft.validate()
}

pub fn ensure_owner(caller: &Caller, idea: &Idea) -> Result<()> {
    if caller.id == idea.owner_id {
        Ok(())
    } else {
        Err(Error::NotAuthorized("only the idea owner can do this"))
    }
}

/// New bids are only taken while an idea is active.
pub fn ensure_open_for_bids(idea: &Idea) -> Result<()> {
    match idea.status {
        IdeaStatus::Active => Ok(()),
        status => Err(Error::IdeaNotOpen(status)),
    }
}

/// Apply an owner's edit. Closed ideas are frozen.
///
/// Lowering the goal to or below the current funding marks an active idea
/// funded and returns `true`. A funded idea stays funded when the goal is
/// raised again.
pub fn apply_update(
    caller: &Caller,
    idea: &mut Idea,
    update: IdeaUpdate,
    now: i64,
) -> Result<bool> {
    ensure_owner(caller, idea)?;
    if idea.status == IdeaStatus::Closed {
        return Err(Error::IdeaNotOpen(idea.status));
    }

    let title = update.title.unwrap_or_else(|| idea.title.clone());
    let description = update
        .description
        .unwrap_or_else(|| idea.description.clone());
    let funding_goal = update.funding_goal.unwrap_or(idea.funding_goal);
    let equity = update.equity_percentage.or(idea.equity_percentage);
    validate_fields(&title, &description, idea.post_type, funding_goal, equity)?;

    idea.title = title.trim().to_string();
    idea.description = description;
    if let Some(category) = update.category {
        idea.category = category;
    }
    idea.funding_goal = funding_goal;
    idea.equity_percentage = equity;
    idea.updated_at = now;

    let reached_goal =
        idea.status == IdeaStatus::Active && idea.current_funding >= idea.funding_goal;
    if reached_goal {
        idea.status = IdeaStatus::Funded;
    }
    Ok(reached_goal)
}

/// Record an accepted investment against the idea.
///
/// Returns `true` when this investment made the idea reach its goal.
pub fn apply_investment(idea: &mut Idea, amount: Amount, now: i64) -> Result<bool> {
    if idea.status == IdeaStatus::Closed {
        return Err(Error::IdeaNotOpen(idea.status));
    }
    if !amount.is_positive() {
        return Err(Error::InvalidAmount("investment must be greater than zero"));
    }
    idea.current_funding = idea.current_funding.checked_add(amount)?;
    idea.updated_at = now;

    if idea.status == IdeaStatus::Active && idea.current_funding >= idea.funding_goal {
        idea.status = IdeaStatus::Funded;
        return Ok(true);
    }
    Ok(false)
}

/// Owner closes the idea. Open bids must be released by the caller.
pub fn close_idea(caller: &Caller, idea: &mut Idea, now: i64) -> Result<Transition<()>> {
    ensure_owner(caller, idea)?;
    if idea.status == IdeaStatus::Closed {
        return Ok(Transition::AlreadyApplied);
    }
    idea.status = IdeaStatus::Closed;
    idea.updated_at = now;
    Ok(Transition::Applied(()))
}

/// Ideas that already took money cannot be destroyed.
pub fn ensure_deletable(caller: &Caller, idea: &Idea, investment_count: i64) -> Result<()> {
    ensure_owner(caller, idea)?;
    if investment_count > 0 {
        return Err(Error::IdeaHasInvestments(idea.id));
    }
    Ok(())
}
