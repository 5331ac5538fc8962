use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Buyer display profile as sent with a purchase
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct BuyerProfile {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserStatsResponse {
    /// Lotteries won
    pub wins: i64,
    /// Tickets bought across all lotteries
    pub tickets: i64,
    /// Unfinished lotteries the user holds tickets in
    pub active_lotteries: i64,
}
