//! `SeaORM` Entity for transactions table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub lock_id: i64,
    pub user: String,
    pub token_address: String,
    pub amount: String,
    pub source_tx_hash: String,
    pub origin_hash: String,
    pub dest_tx_hash: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub retry_count: i32,
    pub ack_status: i32,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
