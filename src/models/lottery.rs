use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{LotteryStatus, lottery_entity, ticket_entity};

use super::BuyerProfile;

/// 购票请求
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct BuyTicketRequest {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// 选择的票号 (1..=max_tickets, 不可重复)
    #[serde(default)]
    pub ticket_numbers: Vec<i32>,
}

impl BuyTicketRequest {
    pub fn profile(&self) -> BuyerProfile {
        BuyerProfile {
            username: self.username.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BuyTicketResponse {
    /// Ticket numbers now owned by the buyer
    pub tickets: Vec<i32>,
    /// Lottery state after the purchase, including the winner when this
    /// purchase sold the last ticket
    pub lottery: LotteryResponse,
}

/// Lottery snapshot returned by `getLottery` and listings
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LotteryResponse {
    pub id: i64,
    pub name: String,
    pub ticket_price: i64,
    pub max_tickets: i32,
    pub tickets_sold: i32,
    /// Distinct buyers
    pub participants: i64,
    pub status: LotteryStatus,
    pub winner_id: Option<i64>,
    pub winner_username: Option<String>,
    pub winner_first_name: Option<String>,
    pub winner_last_name: Option<String>,
    pub winner_ticket_number: Option<i32>,
    pub random_link: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl LotteryResponse {
    pub fn new(
        lottery: lottery_entity::Model,
        participants: i64,
        winning_ticket: Option<&ticket_entity::Model>,
    ) -> Self {
        LotteryResponse {
            id: lottery.id,
            name: lottery.name,
            ticket_price: lottery.ticket_price,
            max_tickets: lottery.max_tickets,
            tickets_sold: lottery.tickets_sold,
            participants,
            status: lottery.status,
            winner_id: lottery.winner_id,
            winner_username: winning_ticket.and_then(|t| t.username.clone()),
            winner_first_name: winning_ticket.and_then(|t| t.first_name.clone()),
            winner_last_name: winning_ticket.and_then(|t| t.last_name.clone()),
            winner_ticket_number: lottery.winner_ticket_number,
            random_link: lottery.random_link,
            created_at: lottery.created_at,
            finished_at: lottery.finished_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LotteryResultResponse {
    pub lottery_id: i64,
    pub winner_id: Option<i64>,
    pub winner_username: Option<String>,
    pub winner_first_name: Option<String>,
    pub winner_last_name: Option<String>,
    pub winner_ticket_number: Option<i32>,
    pub random_link: Option<String>,
}

impl From<LotteryResponse> for LotteryResultResponse {
    fn from(l: LotteryResponse) -> Self {
        LotteryResultResponse {
            lottery_id: l.id,
            winner_id: l.winner_id,
            winner_username: l.winner_username,
            winner_first_name: l.winner_first_name,
            winner_last_name: l.winner_last_name,
            winner_ticket_number: l.winner_ticket_number,
            random_link: l.random_link,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LotteryStatsResponse {
    pub tickets_sold: i32,
    pub revenue: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TicketResponse {
    pub id: i64,
    pub lottery_id: i64,
    pub user_id: i64,
    pub ticket_number: i32,
}

impl From<ticket_entity::Model> for TicketResponse {
    fn from(m: ticket_entity::Model) -> Self {
        TicketResponse {
            id: m.id,
            lottery_id: m.lottery_id,
            user_id: m.user_id,
            ticket_number: m.ticket_number,
        }
    }
}

/// Outcome of a committed draw (`forceDraw` response)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DrawResponse {
    pub lottery_id: i64,
    pub winner_id: i64,
    pub ticket_number: i32,
    pub random_link: Option<String>,
}

/// 创建抽奖 (管理员)
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateLotteryRequest {
    pub name: String,
    pub ticket_price: i64,
    pub max_tickets: i32,
}

/// 修改抽奖 (管理员, 仅 open 状态)
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdateLotteryRequest {
    pub name: String,
    pub ticket_price: i64,
    pub max_tickets: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateLotteryResponse {
    pub id: i64,
}
