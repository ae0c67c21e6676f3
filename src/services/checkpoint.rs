//! Listener checkpoint service
//!
//! Tracks the last block each event listener handled so polling can resume
//! there after a restart instead of starting from the chain head.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::{listener_checkpoints, prelude::ListenerCheckpoints};

/// Listener names used as checkpoint keys
pub mod listeners {
    pub const LOCK_LISTENER: &str = "lock_listener";
    pub const ACK_LISTENER: &str = "ack_listener";
}

#[derive(Clone)]
pub struct CheckpointStore {
    db: DatabaseConnection,
}

impl CheckpointStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Last handled block for `listener`, if any
    pub async fn load(
        &self,
        listener: &str,
    ) -> Result<Option<u64>, Box<dyn std::error::Error + Send + Sync>> {
        let record = ListenerCheckpoints::find()
            .filter(listener_checkpoints::Column::ListenerName.eq(listener))
            .one(&self.db)
            .await?;

        Ok(record.map(|r| r.last_block.max(0) as u64))
    }

    /// Record `block` as handled. Never moves a checkpoint backwards.
    pub async fn save(
        &self,
        listener: &str,
        block: u64,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let block = i64::try_from(block)?;

        let existing = ListenerCheckpoints::find()
            .filter(listener_checkpoints::Column::ListenerName.eq(listener))
            .one(&self.db)
            .await?;

        match existing {
            Some(record) => {
                if record.last_block >= block {
                    return Ok(());
                }
                let mut active_model: listener_checkpoints::ActiveModel = record.into();
                active_model.last_block = Set(block);
                active_model.updated_at = Set(Utc::now().into());
                active_model.update(&self.db).await?;
            }
            None => {
                let new_record = listener_checkpoints::ActiveModel {
                    listener_name: Set(listener.to_string()),
                    last_block: Set(block),
                    updated_at: Set(Utc::now().into()),
                    ..Default::default()
                };
                new_record.insert(&self.db).await?;
            }
        }

        tracing::debug!("[{}] Checkpoint saved at block {}", listener, block);
        Ok(())
    }
}
