use crate::bid::{
    accept_bid, accept_counter, cancel_open_bid, counter_bid, place_bid, reject_bid,
    reject_counter, BidAction, BidPolicy, PlacedBid,
};
use crate::invariants::{
    assert_all_wallet_invariants, assert_funding_matches, assert_money_conserved,
    assert_valid_transition,
};
use crate::types::{
    Amount, Bid, BidId, BidStatus, BidTerms, Caller, Equity, Idea, IdeaStatus, InvestmentStatus,
    PostType, Role, UserId, Wallet,
};
use crate::{Error, LedgerEntryKind, Transition};

const OWNER: UserId = 1;
const INVESTOR: UserId = 2;
const OTHER: UserId = 3;

fn owner() -> Caller {
    Caller::new(OWNER, Some(Role::Entrepreneur))
}

fn investor() -> Caller {
    Caller::new(INVESTOR, Some(Role::Investor))
}

fn idea_with_goal(dollars: i64) -> Idea {
    Idea {
        id: 10,
        owner_id: OWNER,
        title: "Solar kiosks".into(),
        description: "Pay-as-you-go solar charging".into(),
        category: "energy".into(),
        post_type: PostType::Idea,
        funding_goal: Amount::from_dollars(dollars),
        current_funding: Amount::ZERO,
        equity_percentage: None,
        status: IdeaStatus::Active,
        created_at: 0,
        updated_at: 0,
    }
}

fn wallet_with(user_id: UserId, dollars: i64) -> Wallet {
    Wallet {
        user_id,
        available: Amount::from_dollars(dollars),
        reserved: Amount::ZERO,
    }
}

fn terms(dollars: i64, percent: u32) -> BidTerms {
    BidTerms::new(Amount::from_dollars(dollars), Equity::from_percent(percent))
}

fn materialise(placed: PlacedBid, id: BidId) -> Bid {
    Bid {
        id,
        idea_id: placed.bid.idea_id,
        investor_id: placed.bid.investor_id,
        amount: placed.bid.terms.amount,
        equity: placed.bid.terms.equity,
        counter_amount: None,
        counter_equity: None,
        reserved: placed.bid.reserved,
        status: BidStatus::Pending,
        created_at: 100,
        updated_at: 100,
    }
}

/// Investor with $15,000 bids $12,000 at 5% on a $50,000 idea.
fn standard_setup() -> (Idea, Wallet, Wallet, Bid) {
    let idea = idea_with_goal(50_000);
    let mut investor_wallet = wallet_with(INVESTOR, 15_000);
    let owner_wallet = wallet_with(OWNER, 0);
    let placed = place_bid(
        &BidPolicy::default(),
        &investor(),
        &idea,
        &mut investor_wallet,
        terms(12_000, 5),
    )
    .unwrap();
    let bid = materialise(placed, 1);
    (idea, investor_wallet, owner_wallet, bid)
}

#[test]
fn test_place_bid_reserves_funds() {
    let (_idea, investor_wallet, _owner_wallet, bid) = standard_setup();

    assert_eq!(investor_wallet.available, Amount::from_dollars(3_000));
    assert_eq!(investor_wallet.reserved, Amount::from_dollars(12_000));
    assert_eq!(bid.reserved, Amount::from_dollars(12_000));
    assert_eq!(bid.status, BidStatus::Pending);
    assert_all_wallet_invariants(&investor_wallet, &[&bid]);
}

#[test]
fn test_accept_moves_reserved_funds_and_records_investment() {
    let (mut idea, mut investor_wallet, mut owner_wallet, mut bid) = standard_setup();
    let before = (investor_wallet.clone(), owner_wallet.clone());

    let acceptance = accept_bid(
        &owner(),
        &mut bid,
        &mut idea,
        &mut investor_wallet,
        &mut owner_wallet,
        200,
    )
    .unwrap()
    .applied()
    .expect("first accept applies");

    assert_eq!(acceptance.investment.amount, Amount::from_dollars(12_000));
    assert_eq!(acceptance.investment.equity, Equity::from_percent(5));
    assert_eq!(acceptance.investment.status, InvestmentStatus::Completed);
    assert_eq!(acceptance.investment.bid_id, bid.id);
    assert!(!acceptance.idea_funded);

    // Funds left the investor at reservation time, not now.
    assert_eq!(investor_wallet.available, Amount::from_dollars(3_000));
    assert_eq!(investor_wallet.reserved, Amount::ZERO);
    assert_eq!(owner_wallet.available, Amount::from_dollars(12_000));

    assert_eq!(bid.status, BidStatus::Accepted);
    assert_eq!(bid.reserved, Amount::ZERO);
    assert_eq!(bid.updated_at, 200);
    assert_funding_matches(&idea, &[Amount::from_dollars(12_000)]);
    assert_all_wallet_invariants(&investor_wallet, &[&bid]);
    assert_money_conserved(&[&before.0, &before.1], &[&investor_wallet, &owner_wallet]);

    let kinds: Vec<_> = acceptance.movements.iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![LedgerEntryKind::TransferOut, LedgerEntryKind::TransferIn]
    );
}

#[test]
fn test_reject_restores_available_balance() {
    let (idea, mut investor_wallet, _owner_wallet, mut bid) = standard_setup();

    let movement = reject_bid(&owner(), &mut bid, &idea, &mut investor_wallet, 200)
        .unwrap()
        .applied()
        .unwrap();

    assert_eq!(movement.kind, LedgerEntryKind::Release);
    assert_eq!(movement.amount, Amount::from_dollars(12_000));
    assert_eq!(investor_wallet, wallet_with(INVESTOR, 15_000));
    assert_eq!(bid.status, BidStatus::Rejected);
    assert_funding_matches(&idea, &[]);
    assert_all_wallet_invariants(&investor_wallet, &[&bid]);
}

#[test]
fn test_counter_keeps_original_reservation() {
    let (idea, investor_wallet, _owner_wallet, mut bid) = standard_setup();

    let outcome = counter_bid(&owner(), &mut bid, &idea, terms(10_000, 4), 200).unwrap();

    assert!(outcome.is_applied());
    assert_eq!(bid.status, BidStatus::Countered);
    assert_eq!(bid.counter_terms(), Some(terms(10_000, 4)));
    assert_eq!(bid.reserved, Amount::from_dollars(12_000));
    assert_eq!(investor_wallet.reserved, Amount::from_dollars(12_000));
    assert_eq!(investor_wallet.available, Amount::from_dollars(3_000));
    assert_all_wallet_invariants(&investor_wallet, &[&bid]);
}

#[test]
fn test_repeated_accept_does_not_transfer_twice() {
    let (mut idea, mut investor_wallet, mut owner_wallet, mut bid) = standard_setup();

    accept_bid(&owner(), &mut bid, &mut idea, &mut investor_wallet, &mut owner_wallet, 200).unwrap();
    let snapshot = (idea.clone(), investor_wallet.clone(), owner_wallet.clone(), bid.clone());

    let again = accept_bid(&owner(), &mut bid, &mut idea, &mut investor_wallet, &mut owner_wallet, 300)
        .unwrap();

    assert_eq!(again, Transition::AlreadyApplied);
    assert_eq!((idea, investor_wallet, owner_wallet, bid), snapshot);
}

#[test]
fn test_repeated_reject_is_a_no_op() {
    let (idea, mut investor_wallet, _owner_wallet, mut bid) = standard_setup();
    reject_bid(&owner(), &mut bid, &idea, &mut investor_wallet, 200).unwrap();

    let again = reject_bid(&owner(), &mut bid, &idea, &mut investor_wallet, 300).unwrap();
    assert_eq!(again, Transition::AlreadyApplied);
    assert_eq!(investor_wallet, wallet_with(INVESTOR, 15_000));
}

#[test]
fn test_terminal_bids_never_move_again() {
    let (mut idea, mut investor_wallet, mut owner_wallet, mut bid) = standard_setup();
    let from = bid.status;
    accept_bid(&owner(), &mut bid, &mut idea, &mut investor_wallet, &mut owner_wallet, 200).unwrap();
    assert_valid_transition(from, bid.status);

    let err = reject_bid(&owner(), &mut bid, &idea, &mut investor_wallet, 300).unwrap_err();
    assert_eq!(
        err,
        Error::InvalidTransition {
            status: BidStatus::Accepted,
            action: BidAction::Reject
        }
    );
    let err = counter_bid(&owner(), &mut bid, &idea, terms(1_000, 1), 300).unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
    assert_eq!(bid.status, BidStatus::Accepted);

    let (idea, mut investor_wallet, mut owner_wallet, mut bid) = standard_setup();
    let mut idea = idea;
    reject_bid(&owner(), &mut bid, &idea, &mut investor_wallet, 200).unwrap();
    let err = accept_bid(&owner(), &mut bid, &mut idea, &mut investor_wallet, &mut owner_wallet, 300)
        .unwrap_err();
    assert_eq!(
        err,
        Error::InvalidTransition {
            status: BidStatus::Rejected,
            action: BidAction::Accept
        }
    );
    assert_eq!(owner_wallet.available, Amount::ZERO);
}

#[test]
fn test_owner_cannot_bid_on_own_idea() {
    let idea = idea_with_goal(50_000);
    let mut wallet = wallet_with(OWNER, 20_000);
    let caller = Caller::new(OWNER, Some(Role::Investor));

    let err = place_bid(&BidPolicy::default(), &caller, &idea, &mut wallet, terms(1_000, 1)).unwrap_err();

    assert_eq!(err, Error::SelfBid);
    assert_eq!(wallet, wallet_with(OWNER, 20_000));
}

#[test]
fn test_minimum_balance_threshold() {
    let idea = idea_with_goal(50_000);
    let mut wallet = wallet_with(INVESTOR, 9_999);

    let err = place_bid(&BidPolicy::default(), &investor(), &idea, &mut wallet, terms(100, 1)).unwrap_err();
    assert_eq!(
        err,
        Error::BelowMinimumBalance {
            balance: Amount::from_dollars(9_999),
            minimum: Amount::from_dollars(10_000)
        }
    );
    assert_eq!(wallet, wallet_with(INVESTOR, 9_999));

    let relaxed = BidPolicy {
        min_wallet_balance: Amount::ZERO,
    };
    assert!(place_bid(&relaxed, &investor(), &idea, &mut wallet, terms(100, 1)).is_ok());
}

#[test]
fn test_threshold_counts_reserved_funds() {
    // $15,000 with $12,000 already held is still a $15,000 balance.
    let (idea, mut investor_wallet, _owner_wallet, _bid) = standard_setup();
    let second = place_bid(
        &BidPolicy::default(),
        &investor(),
        &idea,
        &mut investor_wallet,
        terms(2_000, 1),
    );
    assert!(second.is_ok());
    assert_eq!(investor_wallet.available, Amount::from_dollars(1_000));
}

#[test]
fn test_bid_exceeding_available_balance_fails() {
    let (idea, mut investor_wallet, _owner_wallet, _bid) = standard_setup();
    let before = investor_wallet.clone();

    let err = place_bid(
        &BidPolicy::default(),
        &investor(),
        &idea,
        &mut investor_wallet,
        terms(3_001, 1),
    )
    .unwrap_err();

    assert_eq!(
        err,
        Error::InsufficientFunds {
            available: Amount::from_dollars(3_000),
            requested: Amount::from_dollars(3_001)
        }
    );
    assert_eq!(investor_wallet, before);
}

#[test]
fn test_bid_terms_are_validated() {
    let idea = idea_with_goal(50_000);
    let policy = BidPolicy::default();
    let mut wallet = wallet_with(INVESTOR, 20_000);

    let zero_amount = BidTerms::new(Amount::ZERO, Equity::from_percent(5));
    assert!(matches!(
        place_bid(&policy, &investor(), &idea, &mut wallet, zero_amount),
        Err(Error::InvalidAmount(_))
    ));

    let zero_equity = BidTerms::new(Amount::from_dollars(1), Equity::from_basis_points(0));
    assert!(matches!(
        place_bid(&policy, &investor(), &idea, &mut wallet, zero_equity),
        Err(Error::InvalidEquity(_))
    ));

    let too_much_equity = BidTerms::new(Amount::from_dollars(1), Equity::from_basis_points(10_001));
    assert!(matches!(
        place_bid(&policy, &investor(), &idea, &mut wallet, too_much_equity),
        Err(Error::InvalidEquity(_))
    ));

    assert_eq!(wallet, wallet_with(INVESTOR, 20_000));
}

#[test]
fn test_only_investors_bid() {
    let idea = idea_with_goal(50_000);
    let mut wallet = wallet_with(OTHER, 20_000);
    let entrepreneur = Caller::new(OTHER, Some(Role::Entrepreneur));
    let unassigned = Caller::new(OTHER, None);

    for caller in [entrepreneur, unassigned] {
        let err = place_bid(&BidPolicy::default(), &caller, &idea, &mut wallet, terms(1_000, 1))
            .unwrap_err();
        assert_eq!(err, Error::RoleRequired(Role::Investor));
    }
}

#[test]
fn test_only_open_ideas_take_bids() {
    let mut wallet = wallet_with(INVESTOR, 20_000);
    for status in [IdeaStatus::Funded, IdeaStatus::Closed] {
        let mut idea = idea_with_goal(50_000);
        idea.status = status;
        let err = place_bid(&BidPolicy::default(), &investor(), &idea, &mut wallet, terms(1_000, 1))
            .unwrap_err();
        assert_eq!(err, Error::IdeaNotOpen(status));
    }
}

#[test]
fn test_only_owner_decides() {
    let (mut idea, mut investor_wallet, mut owner_wallet, mut bid) = standard_setup();
    let stranger = Caller::new(OTHER, Some(Role::Entrepreneur));

    assert!(matches!(
        accept_bid(&stranger, &mut bid, &mut idea, &mut investor_wallet, &mut owner_wallet, 200),
        Err(Error::NotAuthorized(_))
    ));
    assert!(matches!(
        reject_bid(&stranger, &mut bid, &idea, &mut investor_wallet, 200),
        Err(Error::NotAuthorized(_))
    ));
    assert!(matches!(
        counter_bid(&stranger, &mut bid, &idea, terms(1, 1), 200),
        Err(Error::NotAuthorized(_))
    ));
    // The investor cannot accept their own pending bid either.
    assert!(matches!(
        accept_bid(&investor(), &mut bid, &mut idea, &mut investor_wallet, &mut owner_wallet, 200),
        Err(Error::NotAuthorized(_))
    ));
    assert_eq!(bid.status, BidStatus::Pending);
}

#[test]
fn test_counter_terms_are_validated() {
    let (idea, _investor_wallet, _owner_wallet, mut bid) = standard_setup();
    let err = counter_bid(&owner(), &mut bid, &idea, terms(0, 4), 200).unwrap_err();
    assert!(matches!(err, Error::InvalidAmount(_)));
    let err = counter_bid(
        &owner(),
        &mut bid,
        &idea,
        BidTerms::new(Amount::from_dollars(10), Equity::from_basis_points(10_001)),
        200,
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidEquity(_)));
    assert_eq!(bid.status, BidStatus::Pending);
    assert_eq!(bid.counter_amount, None);
}

#[test]
fn test_repeating_the_same_counter_is_a_no_op() {
    let (idea, _investor_wallet, _owner_wallet, mut bid) = standard_setup();
    counter_bid(&owner(), &mut bid, &idea, terms(10_000, 4), 200).unwrap();

    let again = counter_bid(&owner(), &mut bid, &idea, terms(10_000, 4), 300).unwrap();
    assert_eq!(again, Transition::AlreadyApplied);

    let different = counter_bid(&owner(), &mut bid, &idea, terms(9_000, 4), 300).unwrap_err();
    assert_eq!(
        different,
        Error::InvalidTransition {
            status: BidStatus::Countered,
            action: BidAction::Counter
        }
    );
}

#[test]
fn test_owner_cannot_accept_a_countered_bid() {
    let (mut idea, mut investor_wallet, mut owner_wallet, mut bid) = standard_setup();
    counter_bid(&owner(), &mut bid, &idea, terms(10_000, 4), 200).unwrap();

    let err = accept_bid(&owner(), &mut bid, &mut idea, &mut investor_wallet, &mut owner_wallet, 300)
        .unwrap_err();
    assert_eq!(
        err,
        Error::InvalidTransition {
            status: BidStatus::Countered,
            action: BidAction::Accept
        }
    );
}

#[test]
fn test_accept_lower_counter_releases_the_difference() {
    let (mut idea, mut investor_wallet, mut owner_wallet, mut bid) = standard_setup();
    counter_bid(&owner(), &mut bid, &idea, terms(10_000, 4), 200).unwrap();
    let before = (investor_wallet.clone(), owner_wallet.clone());

    let acceptance = accept_counter(
        &investor(),
        &mut bid,
        &mut idea,
        &mut investor_wallet,
        &mut owner_wallet,
        300,
    )
    .unwrap()
    .applied()
    .unwrap();

    assert_eq!(acceptance.investment.amount, Amount::from_dollars(10_000));
    assert_eq!(acceptance.investment.equity, Equity::from_percent(4));
    let kinds: Vec<_> = acceptance.movements.iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![
            LedgerEntryKind::Release,
            LedgerEntryKind::TransferOut,
            LedgerEntryKind::TransferIn
        ]
    );
    assert_eq!(acceptance.movements[0].amount, Amount::from_dollars(2_000));

    assert_eq!(investor_wallet.available, Amount::from_dollars(5_000));
    assert_eq!(investor_wallet.reserved, Amount::ZERO);
    assert_eq!(owner_wallet.available, Amount::from_dollars(10_000));
    assert_eq!(bid.status, BidStatus::Accepted);
    // The original offer stays on record next to the counter terms.
    assert_eq!(bid.amount, Amount::from_dollars(12_000));
    assert_funding_matches(&idea, &[Amount::from_dollars(10_000)]);
    assert_money_conserved(&[&before.0, &before.1], &[&investor_wallet, &owner_wallet]);
}

#[test]
fn test_accept_higher_counter_reserves_the_shortfall() {
    let (mut idea, mut investor_wallet, mut owner_wallet, mut bid) = standard_setup();
    counter_bid(&owner(), &mut bid, &idea, terms(14_000, 6), 200).unwrap();

    let acceptance = accept_counter(
        &investor(),
        &mut bid,
        &mut idea,
        &mut investor_wallet,
        &mut owner_wallet,
        300,
    )
    .unwrap()
    .applied()
    .unwrap();

    assert_eq!(acceptance.movements[0].kind, LedgerEntryKind::Reserve);
    assert_eq!(acceptance.movements[0].amount, Amount::from_dollars(2_000));
    assert_eq!(investor_wallet.available, Amount::from_dollars(1_000));
    assert_eq!(owner_wallet.available, Amount::from_dollars(14_000));
    assert_eq!(idea.current_funding, Amount::from_dollars(14_000));
}

#[test]
fn test_unaffordable_counter_leaves_everything_untouched() {
    let (mut idea, mut investor_wallet, mut owner_wallet, mut bid) = standard_setup();
    counter_bid(&owner(), &mut bid, &idea, terms(16_000, 6), 200).unwrap();
    let snapshot = (idea.clone(), investor_wallet.clone(), owner_wallet.clone(), bid.clone());

    let err = accept_counter(
        &investor(),
        &mut bid,
        &mut idea,
        &mut investor_wallet,
        &mut owner_wallet,
        300,
    )
    .unwrap_err();

    assert!(matches!(err, Error::InsufficientFunds { .. }));
    assert_eq!((idea, investor_wallet, owner_wallet, bid), snapshot);
}

#[test]
fn test_only_the_bidder_resolves_a_counter() {
    let (mut idea, mut investor_wallet, mut owner_wallet, mut bid) = standard_setup();
    counter_bid(&owner(), &mut bid, &idea, terms(10_000, 4), 200).unwrap();

    assert!(matches!(
        accept_counter(&owner(), &mut bid, &mut idea, &mut investor_wallet, &mut owner_wallet, 300),
        Err(Error::NotAuthorized(_))
    ));
    let stranger = Caller::new(OTHER, Some(Role::Investor));
    assert!(matches!(
        reject_counter(&stranger, &mut bid, &mut investor_wallet, 300),
        Err(Error::NotAuthorized(_))
    ));
    assert_eq!(bid.status, BidStatus::Countered);
}

#[test]
fn test_counter_resolution_requires_a_counter() {
    let (mut idea, mut investor_wallet, mut owner_wallet, mut bid) = standard_setup();
    let err = accept_counter(
        &investor(),
        &mut bid,
        &mut idea,
        &mut investor_wallet,
        &mut owner_wallet,
        300,
    )
    .unwrap_err();
    assert_eq!(
        err,
        Error::InvalidTransition {
            status: BidStatus::Pending,
            action: BidAction::AcceptCounter
        }
    );
}

#[test]
fn test_reject_counter_releases_reservation() {
    let (idea, mut investor_wallet, _owner_wallet, mut bid) = standard_setup();
    counter_bid(&owner(), &mut bid, &idea, terms(10_000, 4), 200).unwrap();

    let movement = reject_counter(&investor(), &mut bid, &mut investor_wallet, 300)
        .unwrap()
        .applied()
        .unwrap();

    assert_eq!(movement.amount, Amount::from_dollars(12_000));
    assert_eq!(investor_wallet, wallet_with(INVESTOR, 15_000));
    assert_eq!(bid.status, BidStatus::Rejected);
    assert_valid_transition(BidStatus::Countered, bid.status);
}

#[test]
fn test_closed_idea_cannot_settle() {
    let (mut idea, mut investor_wallet, mut owner_wallet, mut bid) = standard_setup();
    idea.status = IdeaStatus::Closed;

    let err = accept_bid(&owner(), &mut bid, &mut idea, &mut investor_wallet, &mut owner_wallet, 200)
        .unwrap_err();
    assert_eq!(err, Error::IdeaNotOpen(IdeaStatus::Closed));
    assert_eq!(bid.status, BidStatus::Pending);
}

#[test]
fn test_cancel_open_bid_releases_funds() {
    let (_idea, mut investor_wallet, _owner_wallet, mut bid) = standard_setup();

    let movement = cancel_open_bid(&mut bid, &mut investor_wallet, 200).unwrap();
    assert!(movement.is_some());
    assert_eq!(bid.status, BidStatus::Rejected);
    assert_eq!(investor_wallet, wallet_with(INVESTOR, 15_000));

    assert_eq!(cancel_open_bid(&mut bid, &mut investor_wallet, 300).unwrap(), None);
}

#[test]
fn test_bid_for_another_idea_is_refused() {
    let (_idea, mut investor_wallet, mut owner_wallet, mut bid) = standard_setup();
    let mut other = idea_with_goal(1_000);
    other.id = 99;

    let err = accept_bid(&owner(), &mut bid, &mut other, &mut investor_wallet, &mut owner_wallet, 200)
        .unwrap_err();
    assert!(matches!(err, Error::Inconsistent(_)));
}
