//! # Wallet ledger
//!
//! Balance arithmetic for a single [`Wallet`]. Each operation validates,
//! mutates the wallet in place, and returns the movements to append to the
//! ledger. A failed operation leaves the wallet untouched.
//!
//! | Operation  | available | reserved |
//! |------------|-----------|----------|
//! | `deposit`  | `+a`      |          |
//! | `reserve`  | `-a`      | `+a`     |
//! | `release`  | `+a`      | `-a`     |
//! | `transfer` | to: `+a`  | from: `-a` |

use crate::events::{LedgerEntryKind, LedgerMovement};
use crate::types::{Amount, BidId, Wallet};
use crate::{Error, Result};

/// Credit external funds to the available balance.
pub fn deposit(wallet: &mut Wallet, amount: Amount) -> Result<LedgerMovement> {
    if !amount.is_positive() {
        return Err(Error::InvalidAmount("deposit must be greater than zero"));
    }
    wallet.available = wallet.available.checked_add(amount)?;
    Ok(LedgerMovement::new(
        wallet.user_id,
        LedgerEntryKind::Deposit,
        amount,
        None,
    ))
}

/// Earmark `amount` of the available balance.
pub fn reserve(wallet: &mut Wallet, amount: Amount, bid_id: Option<BidId>) -> Result<LedgerMovement> {
    if !amount.is_positive() {
        return Err(Error::InvalidAmount("reservation must be greater than zero"));
    }
    if wallet.available < amount {
        return Err(Error::InsufficientFunds {
            available: wallet.available,
            requested: amount,
        });
    }
    let reserved = wallet.reserved.checked_add(amount)?;
    wallet.available = wallet.available.checked_sub(amount)?;
    wallet.reserved = reserved;
    Ok(LedgerMovement::new(
        wallet.user_id,
        LedgerEntryKind::Reserve,
        amount,
        bid_id,
    ))
}

/// Return previously reserved funds to the available balance.
pub fn release(wallet: &mut Wallet, amount: Amount, bid_id: Option<BidId>) -> Result<LedgerMovement> {
    if !amount.is_positive() {
        return Err(Error::InvalidAmount("release must be greater than zero"));
    }
    if wallet.reserved < amount {
        return Err(Error::ReservationMismatch {
            user_id: wallet.user_id,
            reserved: wallet.reserved,
            requested: amount,
        });
    }
    let available = wallet.available.checked_add(amount)?;
    wallet.reserved = wallet.reserved.checked_sub(amount)?;
    wallet.available = available;
    Ok(LedgerMovement::new(
        wallet.user_id,
        LedgerEntryKind::Release,
        amount,
        bid_id,
    ))
}

/// Move reserved funds out of `from` into the available balance of `to`.
pub fn transfer(
    from: &mut Wallet,
    to: &mut Wallet,
    amount: Amount,
    bid_id: Option<BidId>,
) -> Result<[LedgerMovement; 2]> {
    if from.user_id == to.user_id {
        return Err(Error::SelfTransfer);
    }
    if !amount.is_positive() {
        return Err(Error::InvalidAmount("transfer must be greater than zero"));
    }
    if from.reserved < amount {
        return Err(Error::ReservationMismatch {
            user_id: from.user_id,
            reserved: from.reserved,
            requested: amount,
        });
    }
    let credited = to.available.checked_add(amount)?;
    from.reserved = from.reserved.checked_sub(amount)?;
    to.available = credited;
    Ok([
        LedgerMovement::new(from.user_id, LedgerEntryKind::TransferOut, amount, bid_id),
        LedgerMovement::new(to.user_id, LedgerEntryKind::TransferIn, amount, bid_id),
    ])
}

/// Grow or shrink an existing reservation to `target`.
///
/// Returns `None` when the reservation already has the requested size.
pub fn resize_reservation(
    wallet: &mut Wallet,
    current: Amount,
    target: Amount,
    bid_id: Option<BidId>,
) -> Result<Option<LedgerMovement>> {
    if target > current {
        reserve(wallet, target.checked_sub(current)?, bid_id).map(Some)
    } else if target < current {
        release(wallet, current.checked_sub(target)?, bid_id).map(Some)
    } else {
        Ok(None)
    }
}
