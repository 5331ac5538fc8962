use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Draw state machine: open -> drawing -> finished (terminal).
/// A failed draw releases drawing back to open.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "snake_case")]
pub enum LotteryStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "drawing")]
    Drawing,
    #[sea_orm(string_value = "finished")]
    Finished,
}

/// 抽奖池
/// - tickets_sold: 与 tickets 表中该抽奖的行数一致
/// - winner_id / winner_ticket_number / finished_at: 同时写入, 写入后不可变
/// - random_link: random.org 校验链接, 本地随机时为空
/// - auto_sequence: 自动创建时的编号 (唯一), 管理员创建的为空
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "lotteries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub ticket_price: i64,
    pub max_tickets: i32,
    pub tickets_sold: i32,
    pub status: LotteryStatus,
    pub winner_id: Option<i64>,
    pub winner_ticket_number: Option<i32>,
    #[sea_orm(column_type = "Text", nullable)]
    pub random_link: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub auto_sequence: Option<i64>,
}

impl Model {
    pub fn remaining(&self) -> i32 {
        self.max_tickets - self.tickets_sold
    }

    pub fn is_sold_out(&self) -> bool {
        self.tickets_sold >= self.max_tickets
    }

    pub fn is_finished(&self) -> bool {
        self.status == LotteryStatus::Finished
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tickets::Entity")]
    Tickets,
}

impl Related<super::tickets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
