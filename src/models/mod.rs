pub mod relay;
pub mod transaction;
