pub mod ack_listener;
pub mod lock_listener;
pub mod retry_sync;
