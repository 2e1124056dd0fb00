//! Pure rules that decide who gets what for how much.
//!
//! Nothing in here touches the ledger or the gateway. The reconciliation core calls these before opening a charge
//! and again, with gateway-verified amounts, inside the reconciliation unit.
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

use crate::{
    bpe_api::errors::ReconciliationError,
    db_types::{Bot, MinorUnits, NewGrant, PaymentType, PayoutProfile, Transaction},
};

/// Company cut on a purchase routed to an admin with payout details on file.
pub const PURCHASE_COMPANY_PERCENT: u8 = 30;
/// Company cut on a rental routed to an admin with payout details on file.
pub const RENT_COMPANY_PERCENT: u8 = 20;
/// Company cut when the admin cannot be paid out.
pub const FULL_COMPANY_PERCENT: u8 = 100;
pub const RENTAL_PERIOD_DAYS: i64 = 30;

pub fn parse_payment_type(value: &str) -> Result<PaymentType, ReconciliationError> {
    PaymentType::from_str(value).map_err(|_| ReconciliationError::InvalidPaymentType(value.to_string()))
}

/// The company percentage for a charge. An admin with neither a payout subaccount nor complete bank details cannot
/// receive funds, so the company keeps everything.
pub fn compute_split(profile: Option<&PayoutProfile>, payment_type: PaymentType) -> u8 {
    let can_be_paid = profile.map(|p| p.has_subaccount() || p.has_bank_details()).unwrap_or(false);
    if !can_be_paid {
        return FULL_COMPANY_PERCENT;
    }
    match payment_type {
        PaymentType::Purchase => PURCHASE_COMPANY_PERCENT,
        PaymentType::Rent => RENT_COMPANY_PERCENT,
    }
}

pub fn expected_price(bot: &Bot, payment_type: PaymentType) -> MinorUnits {
    match payment_type {
        PaymentType::Purchase => bot.price,
        PaymentType::Rent => bot.rent_price,
    }
}

/// Overpayment is accepted. Anything short of the list price is not.
pub fn validate_amount(paid: MinorUnits, expected: MinorUnits) -> Result<(), ReconciliationError> {
    if paid < expected {
        return Err(ReconciliationError::AmountTooLow { paid, expected });
    }
    Ok(())
}

/// A user cannot buy a bot they already own, whether through an earlier purchase or because they are its owner.
pub fn guard_duplicate_purchase(
    user_id: i64,
    bot: &Bot,
    prior_purchase: Option<&Transaction>,
) -> Result<(), ReconciliationError> {
    if prior_purchase.is_some() || bot.owner_id == user_id {
        return Err(ReconciliationError::AlreadyOwned { bot_id: bot.id });
    }
    Ok(())
}

pub fn guard_duplicate_pending(pending: Option<&Transaction>) -> Result<(), ReconciliationError> {
    match pending {
        Some(tx) => Err(ReconciliationError::PendingExists(tx.reference.clone())),
        None => Ok(()),
    }
}

pub fn rental_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(RENTAL_PERIOD_DAYS)
}

/// The grant a successful transaction earns. Purchases never expire.
pub fn entitlement_for(tx: &Transaction, now: DateTime<Utc>) -> NewGrant {
    let expiry_date = match tx.payment_type {
        PaymentType::Purchase => None,
        PaymentType::Rent => Some(rental_expiry(now)),
    };
    NewGrant {
        user_id: tx.user_id,
        bot_id: tx.bot_id,
        access_type: tx.payment_type,
        expiry_date,
        transaction_id: tx.id,
    }
}
