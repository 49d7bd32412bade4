//! Persistence for famdigest.

pub mod error;
pub mod models;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use models::{
    Calendar, Connection, MessageDirection, MessageLog, NewConnection, NewMessageLog,
    NewSubscription, Owner, Subscription,
};
pub use store::Store;
