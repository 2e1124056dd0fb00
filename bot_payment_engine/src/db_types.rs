//! Types that are persisted in the ledger store, or passed into and out of it.
use std::{fmt::Display, str::FromStr};

pub use bmp_common::MinorUnits;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------         Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    SuperAdmin,
}

impl Role {
    /// Roles are hierarchical: a superadmin can do everything an admin can, and an admin everything a user can.
    pub fn grants(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    fn rank(&self) -> u8 {
        match self {
            Role::User => 0,
            Role::Admin => 1,
            Role::SuperAdmin => 2,
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
            Role::SuperAdmin => write!(f, "superadmin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "superadmin" => Ok(Self::SuperAdmin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------      Principal        ---------------------------------------------------------
/// The authenticated caller of an API method, as established by the identity layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

impl Principal {
    pub fn new<S: Into<String>>(user_id: i64, email: S, role: Role) -> Self {
        Self { user_id, email: email.into(), role }
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

//--------------------------------------    UpgradeStatus      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UpgradeStatus {
    Pending,
    Approved,
    Rejected,
}

//--------------------------------------         User          ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub upgrade_request_status: Option<UpgradeStatus>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl NewUser {
    pub fn new(name: &str, email: &str, role: Role) -> Self {
        Self { name: name.to_string(), email: email.to_string(), role }
    }
}

//--------------------------------------     PayoutProfile     ---------------------------------------------------------
/// An admin's payout details. The gateway subaccount code is issued lazily, the first time one of the admin's bots is
/// charged with complete bank details on file.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PayoutProfile {
    pub id: i64,
    pub user_id: i64,
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
    pub subaccount_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayoutProfile {
    pub fn has_bank_details(&self) -> bool {
        !self.bank_code.trim().is_empty() && !self.account_number.trim().is_empty()
    }

    pub fn has_subaccount(&self) -> bool {
        self.subaccount_code.as_ref().is_some_and(|c| !c.trim().is_empty())
    }

    /// Bank details are on file, but the gateway has not issued a subaccount for them yet.
    pub fn needs_subaccount(&self) -> bool {
        !self.has_subaccount() && self.has_bank_details()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankDetails {
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
}

//--------------------------------------          Bot          ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Bot {
    pub id: i64,
    pub name: String,
    /// Purchase price
    pub price: MinorUnits,
    pub rent_price: MinorUnits,
    /// The current rights holder. Moves to the buyer on every successful purchase.
    pub owner_id: i64,
    pub status: String,
    pub subscription_type: Option<String>,
    pub subscription_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBot {
    pub name: String,
    pub price: MinorUnits,
    pub rent_price: MinorUnits,
    pub owner_id: i64,
}

impl NewBot {
    pub fn new(name: &str, price: MinorUnits, rent_price: MinorUnits, owner_id: i64) -> Self {
        Self { name: name.to_string(), price, rent_price, owner_id }
    }
}

//--------------------------------------      PaymentType      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Purchase,
    Rent,
}

/// Grants carry the same purchase/rent distinction as the payment that created them.
pub type AccessType = PaymentType;

impl Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentType::Purchase => write!(f, "purchase"),
            PaymentType::Rent => write!(f, "rent"),
        }
    }
}

impl FromStr for PaymentType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "purchase" => Ok(Self::Purchase),
            "rent" => Ok(Self::Rent),
            s => Err(ConversionError(format!("Invalid payment type: {s}"))),
        }
    }
}

//--------------------------------------   TransactionStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Pending => write!(f, "pending"),
            TransactionStatus::Success => write!(f, "success"),
            TransactionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid transaction status: {s}"))),
        }
    }
}

//--------------------------------------     RevenueSplit      ---------------------------------------------------------
/// How a payment is divided between the platform and the bot's admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSplit {
    pub company_percent: u8,
    pub company_share: MinorUnits,
    pub admin_share: MinorUnits,
}

impl RevenueSplit {
    /// The company share is rounded down; the admin receives the remainder so that nothing is lost to rounding.
    pub fn new(amount: MinorUnits, company_percent: u8) -> Self {
        let company_percent = company_percent.min(100);
        let company_share = amount.percent(company_percent);
        Self { company_percent, company_share, admin_share: amount - company_share }
    }
}

//--------------------------------------      Transaction      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    /// The paying user
    pub user_id: i64,
    /// The beneficiary: the bot's owner at the time the charge was opened
    pub admin_id: i64,
    pub bot_id: i64,
    pub amount: MinorUnits,
    pub company_share: MinorUnits,
    pub admin_share: MinorUnits,
    pub company_percent: i64,
    pub reference: String,
    pub status: TransactionStatus,
    pub payment_channel: String,
    pub payment_type: PaymentType,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// The stored percentage, clamped into range for recomputing the split on a verified amount.
    pub fn split_percent(&self) -> u8 {
        u8::try_from(self.company_percent.clamp(0, 100)).unwrap_or(100)
    }
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub admin_id: i64,
    pub bot_id: i64,
    pub amount: MinorUnits,
    pub split: RevenueSplit,
    pub reference: String,
    pub payment_channel: String,
    pub payment_type: PaymentType,
    pub description: String,
}

//--------------------------------------         Sale          ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Sale {
    pub id: i64,
    pub bot_id: i64,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub amount: MinorUnits,
    pub sale_type: PaymentType,
    pub transaction_ref: String,
    pub sale_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSale {
    pub bot_id: i64,
    pub seller_id: i64,
    pub buyer_id: i64,
    pub amount: MinorUnits,
    pub sale_type: PaymentType,
    pub transaction_ref: String,
}

//--------------------------------------   EntitlementGrant    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EntitlementGrant {
    pub id: i64,
    pub user_id: i64,
    pub bot_id: i64,
    pub access_type: AccessType,
    pub is_active: bool,
    /// Only rentals expire
    pub expiry_date: Option<DateTime<Utc>>,
    pub transaction_id: Option<i64>,
    pub purchase_date: DateTime<Utc>,
}

impl EntitlementGrant {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expiry_date.map_or(true, |expiry| expiry > now)
    }
}

#[derive(Debug, Clone)]
pub struct NewGrant {
    pub user_id: i64,
    pub bot_id: i64,
    pub access_type: AccessType,
    pub expiry_date: Option<DateTime<Utc>>,
    pub transaction_id: i64,
}
