//! `SeaORM` Entity prelude

pub use super::listener_checkpoints::Entity as ListenerCheckpoints;
pub use super::transactions::Entity as Transactions;
