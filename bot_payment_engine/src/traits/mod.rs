//! # Backend contracts
//!
//! The engine is written against these traits rather than a concrete database or payment processor.
//!
//! * [`LedgerStore`] is the durable record of charges. It hands out [`LedgerUnit`]s, the atomic unit of work that
//!   every reconciliation runs inside.
//! * [`AccountManagement`] provides queries over users, transactions and grants, and the account state that lives
//!   outside the payment path (bank details, role upgrades).
//! * [`PaymentGateway`] is the outbound boundary to the payment processor.
mod account_management;
mod ledger_store;
mod payment_gateway;

pub use account_management::AccountManagement;
pub use ledger_store::{InsertTransactionResult, LedgerError, LedgerStore, LedgerUnit};
pub use payment_gateway::{
    ChargeAuthorization,
    ChargeRequest,
    ChargeStatus,
    GatewayError,
    PaymentGateway,
    VerifiedCharge,
    WebhookEvent,
};
