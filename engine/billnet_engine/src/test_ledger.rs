use crate::bid::{place_bid, BidPolicy};
use crate::invariants::{assert_money_conserved, assert_wallet_non_negative};
use crate::types::{Amount, BidTerms, Caller, Equity, Idea, IdeaStatus, PostType, Role, Wallet};
use crate::wallet::{deposit, release, reserve, resize_reservation, transfer};
use crate::{Error, LedgerEntryKind};

fn wallet(user_id: i64, dollars: i64) -> Wallet {
    Wallet {
        user_id,
        available: Amount::from_dollars(dollars),
        reserved: Amount::ZERO,
    }
}

#[test]
fn test_deposit_credits_available() {
    let mut w = Wallet::new(7);
    let movement = deposit(&mut w, Amount::from_dollars(250)).unwrap();

    assert_eq!(movement.kind, LedgerEntryKind::Deposit);
    assert_eq!(movement.user_id, 7);
    assert_eq!(w.available, Amount::from_dollars(250));
    assert_eq!(w.reserved, Amount::ZERO);

    assert!(matches!(
        deposit(&mut w, Amount::ZERO),
        Err(Error::InvalidAmount(_))
    ));
    assert!(matches!(
        deposit(&mut w, Amount::from_cents(-1)),
        Err(Error::InvalidAmount(_))
    ));
}

#[test]
fn test_reserve_then_release_is_identity() {
    let original = wallet(1, 15_000);
    let mut w = original.clone();

    reserve(&mut w, Amount::from_dollars(12_000), Some(4)).unwrap();
    assert_eq!(w.available, Amount::from_dollars(3_000));
    assert_eq!(w.total().unwrap(), Amount::from_dollars(15_000));

    let movement = release(&mut w, Amount::from_dollars(12_000), Some(4)).unwrap();
    assert_eq!(movement.bid_id, Some(4));
    assert_eq!(w, original);
}

#[test]
fn test_reserve_cannot_overdraw() {
    let mut w = wallet(1, 100);
    let err = reserve(&mut w, Amount::from_cents(10_001), None).unwrap_err();

    assert_eq!(
        err,
        Error::InsufficientFunds {
            available: Amount::from_dollars(100),
            requested: Amount::from_cents(10_001),
        }
    );
    assert_eq!(w, wallet(1, 100));
}

#[test]
fn test_release_more_than_reserved_is_refused() {
    let mut w = wallet(1, 100);
    reserve(&mut w, Amount::from_dollars(40), None).unwrap();

    let err = release(&mut w, Amount::from_dollars(41), None).unwrap_err();
    assert!(matches!(err, Error::ReservationMismatch { user_id: 1, .. }));
    assert_eq!(w.reserved, Amount::from_dollars(40));
}

#[test]
fn test_transfer_moves_reserved_to_recipient() {
    let mut from = wallet(1, 500);
    let mut to = wallet(2, 10);
    reserve(&mut from, Amount::from_dollars(300), Some(9)).unwrap();
    let before = (from.clone(), to.clone());

    let [out, inbound] = transfer(&mut from, &mut to, Amount::from_dollars(300), Some(9)).unwrap();

    assert_eq!(out.kind, LedgerEntryKind::TransferOut);
    assert_eq!(out.available_delta(), 0);
    assert_eq!(inbound.kind, LedgerEntryKind::TransferIn);
    assert_eq!(from.available, Amount::from_dollars(200));
    assert_eq!(from.reserved, Amount::ZERO);
    assert_eq!(to.available, Amount::from_dollars(310));
    assert_money_conserved(&[&before.0, &before.1], &[&from, &to]);
}

#[test]
fn test_transfer_only_spends_reserved_funds() {
    let mut from = wallet(1, 500);
    let mut to = wallet(2, 0);

    let err = transfer(&mut from, &mut to, Amount::from_dollars(1), None).unwrap_err();
    assert!(matches!(err, Error::ReservationMismatch { .. }));

    let mut same = wallet(1, 0);
    assert_eq!(
        transfer(&mut from, &mut same, Amount::from_dollars(1), None).unwrap_err(),
        Error::SelfTransfer
    );
}

#[test]
fn test_resize_reservation() {
    let mut w = wallet(1, 100);
    reserve(&mut w, Amount::from_dollars(50), None).unwrap();

    let grown = resize_reservation(&mut w, Amount::from_dollars(50), Amount::from_dollars(80), None)
        .unwrap()
        .unwrap();
    assert_eq!(grown.kind, LedgerEntryKind::Reserve);
    assert_eq!(w.reserved, Amount::from_dollars(80));

    let shrunk = resize_reservation(&mut w, Amount::from_dollars(80), Amount::from_dollars(30), None)
        .unwrap()
        .unwrap();
    assert_eq!(shrunk.kind, LedgerEntryKind::Release);
    assert_eq!(w.available, Amount::from_dollars(70));

    assert_eq!(
        resize_reservation(&mut w, Amount::from_dollars(30), Amount::from_dollars(30), None).unwrap(),
        None
    );
}

#[test]
fn test_competing_bids_cannot_double_spend() {
    let idea = Idea {
        id: 1,
        owner_id: 100,
        title: "Cold chain".into(),
        description: "Refrigerated last mile".into(),
        category: "logistics".into(),
        post_type: PostType::Business,
        funding_goal: Amount::from_dollars(100_000),
        current_funding: Amount::ZERO,
        equity_percentage: None,
        status: IdeaStatus::Active,
        created_at: 0,
        updated_at: 0,
    };
    let caller = Caller::new(5, Some(Role::Investor));
    let policy = BidPolicy::default();
    let mut w = wallet(5, 20_000);

    let first = BidTerms::new(Amount::from_dollars(12_000), Equity::from_percent(3));
    let second = BidTerms::new(Amount::from_dollars(9_000), Equity::from_percent(2));

    assert!(place_bid(&policy, &caller, &idea, &mut w, first).is_ok());
    let err = place_bid(&policy, &caller, &idea, &mut w, second).unwrap_err();

    assert!(matches!(err, Error::InsufficientFunds { .. }));
    assert_eq!(w.reserved, Amount::from_dollars(12_000));
    assert_eq!(w.available, Amount::from_dollars(8_000));
    assert_wallet_non_negative(&w);
}
