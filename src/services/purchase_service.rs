use crate::error::{AppError, AppResult};
use crate::models::{BuyTicketResponse, BuyerProfile};
use crate::services::{DrawService, DrawTrigger, LedgerService, LotteryService};
use std::collections::HashSet;

/// 购票: 校验请求, 原子预留票号, 售罄时同步开奖
#[derive(Clone)]
pub struct PurchaseService {
    ledger: LedgerService,
    draw: DrawService,
    lotteries: LotteryService,
}

impl PurchaseService {
    pub fn new(ledger: LedgerService, draw: DrawService, lotteries: LotteryService) -> Self {
        Self {
            ledger,
            draw,
            lotteries,
        }
    }

    /// Reserve `numbers` for the buyer. The purchase that sells the last
    /// ticket runs the draw before returning, so its response already carries
    /// the winner. Once the reservation commits the purchase succeeds.
    pub async fn buy_ticket(
        &self,
        lottery_id: i64,
        buyer_id: i64,
        profile: &BuyerProfile,
        numbers: &[i32],
    ) -> AppResult<BuyTicketResponse> {
        validate_request(buyer_id, numbers)?;

        let reservation = self
            .ledger
            .reserve(lottery_id, buyer_id, profile, numbers)
            .await?;

        // The tickets are committed whatever the draw does; a failed draw leaves
        // the lottery open for a forced retry.
        if reservation.lottery.is_sold_out() && reservation.lottery.winner_id.is_none() {
            match self.draw.draw(lottery_id, DrawTrigger::SoldOut).await {
                Ok(_) => {}
                // a concurrent trigger got there first
                Err(AppError::AlreadyFinished(_)) => {}
                Err(e) => {
                    log::error!(
                        "Lottery {lottery_id} sold out but the draw failed, awaiting forced draw: {e}"
                    );
                }
            }
        }

        let lottery = self.lotteries.get_lottery(lottery_id).await?;
        Ok(BuyTicketResponse {
            tickets: reservation.numbers,
            lottery,
        })
    }
}

fn validate_request(buyer_id: i64, numbers: &[i32]) -> AppResult<()> {
    if buyer_id <= 0 {
        return Err(AppError::ValidationError("Invalid user id".into()));
    }
    if numbers.is_empty() {
        return Err(AppError::ValidationError("No tickets selected".into()));
    }
    let mut seen = HashSet::with_capacity(numbers.len());
    if let Some(dup) = numbers.iter().find(|n| !seen.insert(**n)) {
        return Err(AppError::ValidationError(format!(
            "Ticket {dup} requested more than once"
        )));
    }
    Ok(())
}
