mod api;
mod config;
mod error;

mod data_objects;
pub mod signature;

pub use api::PaystackApi;
pub use config::PaystackConfig;
pub use data_objects::{
    ChargeEventData,
    CreateSubaccountRequest,
    Customer,
    InitializeTransactionRequest,
    PaystackEvent,
    PaystackResponse,
    Subaccount,
    TransactionAuthorization,
    TransactionStatus,
    TransactionVerification,
};
pub use error::PaystackApiError;
