use crate::entities::{LotteryStatus, lottery_entity as lotteries, ticket_entity as tickets};
use crate::error::{AppError, AppResult};
use crate::models::DrawResponse;
use crate::services::{DrawAnnouncement, LedgerService, NotificationService, RandomSource};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveEnum, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

/// Why a draw was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawTrigger {
    /// The last ticket was sold
    SoldOut,
    /// Operator request; skips the sold-out precondition only
    Forced,
}

/// 开奖引擎
///
/// 状态流转: open -> drawing -> finished
/// - 进入 drawing 是一次条件更新 (status = open), 同一抽奖只有一个请求能成功
/// - 随机数请求在任何锁之外进行
/// - 提交时再次校验 status = drawing 且 winner_id 为空
/// - 通知在提交成功之后异步发送
#[derive(Clone)]
pub struct DrawService {
    pool: DatabaseConnection,
    ledger: LedgerService,
    random_source: RandomSource,
    notifier: NotificationService,
}

impl DrawService {
    pub fn new(
        pool: DatabaseConnection,
        ledger: LedgerService,
        random_source: RandomSource,
        notifier: NotificationService,
    ) -> Self {
        Self {
            pool,
            ledger,
            random_source,
            notifier,
        }
    }

    /// Select and commit the winner of `lottery_id`, at most once per lottery.
    pub async fn draw(&self, lottery_id: i64, trigger: DrawTrigger) -> AppResult<DrawResponse> {
        self.claim(lottery_id, trigger).await?;

        match self.draw_claimed(lottery_id).await {
            Ok((result, announcement)) => {
                if let Some(announcement) = announcement {
                    self.notifier.announce(announcement);
                }
                Ok(result)
            }
            Err(AppError::AlreadyFinished(id)) => Err(AppError::AlreadyFinished(id)),
            Err(e) => {
                self.release_claim(lottery_id).await;
                Err(e)
            }
        }
    }

    /// open -> drawing, guarded by the draw preconditions.
    async fn claim(&self, lottery_id: i64, trigger: DrawTrigger) -> AppResult<()> {
        let mut update = lotteries::Entity::update_many()
            .col_expr(
                lotteries::Column::Status,
                Expr::value(LotteryStatus::Drawing.to_value()),
            )
            .filter(lotteries::Column::Id.eq(lottery_id))
            .filter(lotteries::Column::Status.eq(LotteryStatus::Open))
            .filter(lotteries::Column::WinnerId.is_null())
            .filter(lotteries::Column::TicketsSold.gt(0));
        if trigger == DrawTrigger::SoldOut {
            update = update.filter(
                Expr::col(lotteries::Column::TicketsSold)
                    .gte(Expr::col(lotteries::Column::MaxTickets)),
            );
        }

        let res = update.exec(&self.pool).await?;
        if res.rows_affected == 1 {
            log::info!("Lottery {lottery_id}: draw started ({trigger:?})");
            return Ok(());
        }

        let lottery = lotteries::Entity::find_by_id(lottery_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lottery {lottery_id} not found")))?;

        if lottery.winner_id.is_some() || lottery.status != LotteryStatus::Open {
            log::info!(
                "Lottery {lottery_id}: draw skipped, already {:?}",
                lottery.status
            );
            return Err(AppError::AlreadyFinished(lottery_id));
        }
        if lottery.tickets_sold == 0 {
            return Err(AppError::Conflict(format!(
                "Lottery {lottery_id} has no tickets sold"
            )));
        }
        Err(AppError::Conflict(format!(
            "Lottery {lottery_id} is not sold out ({}/{})",
            lottery.tickets_sold, lottery.max_tickets
        )))
    }

    async fn draw_claimed(
        &self,
        lottery_id: i64,
    ) -> AppResult<(DrawResponse, Option<DrawAnnouncement>)> {
        let lottery = lotteries::Entity::find_by_id(lottery_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lottery {lottery_id} not found")))?;

        // Sales stop once the lottery leaves `open`, so this set is final
        let sold = self.ledger.tickets(lottery_id).await?;
        if sold.len() as i64 != lottery.tickets_sold as i64 {
            return Err(AppError::InvariantViolation(format!(
                "lottery {lottery_id}: tickets_sold = {} but ledger holds {} tickets",
                lottery.tickets_sold,
                sold.len()
            )));
        }

        let outcome = self.random_source.draw(lottery.tickets_sold as i64).await;
        let winner = resolve_winner(&sold, outcome.winning_number).ok_or_else(|| {
            AppError::InvariantViolation(format!(
                "lottery {lottery_id}: drawn number {} was never sold ({} tickets sold)",
                outcome.winning_number,
                sold.len()
            ))
        })?;

        let committed = lotteries::Entity::update_many()
            .col_expr(
                lotteries::Column::Status,
                Expr::value(LotteryStatus::Finished.to_value()),
            )
            .col_expr(lotteries::Column::WinnerId, Expr::value(winner.user_id))
            .col_expr(
                lotteries::Column::WinnerTicketNumber,
                Expr::value(winner.ticket_number),
            )
            .col_expr(
                lotteries::Column::RandomLink,
                Expr::value(outcome.verification_link.clone()),
            )
            .col_expr(lotteries::Column::FinishedAt, Expr::value(Utc::now()))
            .filter(lotteries::Column::Id.eq(lottery_id))
            .filter(lotteries::Column::Status.eq(LotteryStatus::Drawing))
            .filter(lotteries::Column::WinnerId.is_null())
            .exec(&self.pool)
            .await?;

        if committed.rows_affected != 1 {
            log::info!("Lottery {lottery_id}: winner already committed elsewhere");
            return Err(AppError::AlreadyFinished(lottery_id));
        }

        log::info!(
            "Lottery {lottery_id} finished: winner {} with ticket #{} (verifiable: {})",
            winner.user_id,
            winner.ticket_number,
            outcome.verification_link.is_some()
        );

        let result = DrawResponse {
            lottery_id,
            winner_id: winner.user_id,
            ticket_number: winner.ticket_number,
            random_link: outcome.verification_link.clone(),
        };

        // The winner is committed; a failure from here on only costs the notifications
        let announcement = match self.ledger.participants(lottery_id).await {
            Ok(participants) => Some(DrawAnnouncement {
                lottery_id,
                lottery_name: lottery.name.clone(),
                winner_id: winner.user_id,
                winner_name: winner.display_name(),
                ticket_number: winner.ticket_number,
                random_link: outcome.verification_link,
                participants: participants.into_iter().map(|t| t.user_id).collect(),
            }),
            Err(e) => {
                log::warn!("Lottery {lottery_id}: cannot load participants for notification: {e}");
                None
            }
        };

        Ok((result, announcement))
    }

    /// drawing -> open after a failed draw
    async fn release_claim(&self, lottery_id: i64) {
        let res = lotteries::Entity::update_many()
            .col_expr(
                lotteries::Column::Status,
                Expr::value(LotteryStatus::Open.to_value()),
            )
            .filter(lotteries::Column::Id.eq(lottery_id))
            .filter(lotteries::Column::Status.eq(LotteryStatus::Drawing))
            .filter(lotteries::Column::WinnerId.is_null())
            .exec(&self.pool)
            .await;
        if let Err(e) = res {
            log::error!("Lottery {lottery_id}: failed to release draw claim: {e}");
        }
    }
}

/// The ticket whose number is the drawn value. The signed value and the
/// committed ticket number are the same, so the verification link proves the winner.
fn resolve_winner(sold: &[tickets::Model], drawn: i64) -> Option<&tickets::Model> {
    sold.iter().find(|t| i64::from(t.ticket_number) == drawn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BuyerProfile;
    use crate::test_support::{Harness, create_lottery};
    use std::time::Duration;

    async fn sell(h: &Harness, lottery_id: i64, buyer: i64, numbers: &[i32]) {
        h.ledger
            .reserve(lottery_id, buyer, &BuyerProfile::default(), numbers)
            .await
            .unwrap();
    }

    async fn reload(h: &Harness, lottery_id: i64) -> lotteries::Model {
        lotteries::Entity::find_by_id(lottery_id)
            .one(&h.db)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_forced_draw_uses_tickets_sold_range() {
        for seed in 0..20 {
            let h = Harness::new(seed).await;
            let lottery = create_lottery(&h.db, 100).await;
            sell(&h, lottery.id, 1, &[1, 2]).await;
            sell(&h, lottery.id, 2, &[3, 4]).await;

            let result = h.draw.draw(lottery.id, DrawTrigger::Forced).await.unwrap();
            assert!((1..=4).contains(&result.ticket_number), "{result:?}");
            assert_eq!(result.random_link, None);

            let after = reload(&h, lottery.id).await;
            assert_eq!(after.status, LotteryStatus::Finished);
            assert_eq!(after.winner_id, Some(result.winner_id));
            assert_eq!(after.winner_ticket_number, Some(result.ticket_number));
            assert!(after.finished_at.is_some());

            let ticket = h
                .ledger
                .find_ticket(lottery.id, result.ticket_number)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(ticket.user_id, result.winner_id);
        }
    }

    #[tokio::test]
    async fn test_sparse_numbers_without_drawn_ticket_are_invariant_violation() {
        let h = Harness::new(3).await;
        let lottery = create_lottery(&h.db, 100).await;
        sell(&h, lottery.id, 1, &[17, 42]).await;
        sell(&h, lottery.id, 2, &[99]).await;

        // draws from [1, 3]; none of those numbers was sold
        let err = h
            .draw
            .draw(lottery.id, DrawTrigger::Forced)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvariantViolation(_)), "{err:?}");

        let after = reload(&h, lottery.id).await;
        assert_eq!(after.status, LotteryStatus::Open);
        assert_eq!(after.winner_ticket_number, None);
    }

    #[tokio::test]
    async fn test_committed_ticket_number_is_the_drawn_value() {
        for seed in 0..10 {
            let h = Harness::new(seed).await;
            let lottery = create_lottery(&h.db, 10).await;
            sell(&h, lottery.id, 1, &[1, 3]).await;
            sell(&h, lottery.id, 2, &[2]).await;

            // same seed, same first value as the engine's source
            let expected = RandomSource::fallback_only(Some(seed)).draw(3).await;
            let result = h.draw.draw(lottery.id, DrawTrigger::Forced).await.unwrap();
            assert_eq!(i64::from(result.ticket_number), expected.winning_number);
        }
    }

    #[tokio::test]
    async fn test_unforced_draw_requires_sold_out() {
        let h = Harness::new(1).await;
        let lottery = create_lottery(&h.db, 10).await;
        sell(&h, lottery.id, 1, &[1]).await;

        let err = h
            .draw
            .draw(lottery.id, DrawTrigger::SoldOut)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
        assert_eq!(reload(&h, lottery.id).await.status, LotteryStatus::Open);
    }

    #[tokio::test]
    async fn test_draw_on_empty_or_missing_lottery() {
        let h = Harness::new(1).await;
        let lottery = create_lottery(&h.db, 10).await;

        assert!(matches!(
            h.draw.draw(lottery.id, DrawTrigger::Forced).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            h.draw.draw(424242, DrawTrigger::Forced).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_redraw_is_rejected_and_state_unchanged() {
        let h = Harness::new(5).await;
        let lottery = create_lottery(&h.db, 3).await;
        sell(&h, lottery.id, 1, &[1, 2, 3]).await;

        h.draw.draw(lottery.id, DrawTrigger::SoldOut).await.unwrap();
        let before = reload(&h, lottery.id).await;

        for trigger in [DrawTrigger::SoldOut, DrawTrigger::Forced] {
            assert!(matches!(
                h.draw.draw(lottery.id, trigger).await,
                Err(AppError::AlreadyFinished(id)) if id == lottery.id
            ));
        }
        assert_eq!(reload(&h, lottery.id).await, before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_triggers_commit_exactly_once() {
        let h = Harness::multi_connection(11).await;
        let lottery = create_lottery(&h.db, 10).await;
        sell(&h, lottery.id, 1, &[1, 2, 3, 4, 5]).await;

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let draw = h.draw.clone();
                let id = lottery.id;
                tokio::spawn(async move { draw.draw(id, DrawTrigger::Forced).await })
            })
            .collect();

        let mut finished = 0;
        let mut already = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => finished += 1,
                Err(AppError::AlreadyFinished(_)) => already += 1,
                Err(e) => panic!("unexpected: {e:?}"),
            }
        }
        assert_eq!((finished, already), (1, 1));
    }

    #[tokio::test]
    async fn test_ledger_divergence_is_an_invariant_violation() {
        let h = Harness::new(2).await;
        let lottery = create_lottery(&h.db, 10).await;
        sell(&h, lottery.id, 1, &[1, 2, 3, 4]).await;

        // counter claims a fifth ticket the ledger never recorded
        lotteries::Entity::update_many()
            .col_expr(lotteries::Column::TicketsSold, Expr::value(5))
            .filter(lotteries::Column::Id.eq(lottery.id))
            .exec(&h.db)
            .await
            .unwrap();

        let err = h
            .draw
            .draw(lottery.id, DrawTrigger::Forced)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvariantViolation(_)), "{err:?}");

        // claim released, nothing committed
        let after = reload(&h, lottery.id).await;
        assert_eq!(after.status, LotteryStatus::Open);
        assert_eq!(after.winner_id, None);
        assert_eq!(after.finished_at, None);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_affect_commit() {
        let h = Harness::with_failing_recipients(8, [2]).await;
        let lottery = create_lottery(&h.db, 3).await;
        sell(&h, lottery.id, 1, &[1]).await;
        sell(&h, lottery.id, 2, &[2]).await;
        sell(&h, lottery.id, 3, &[3]).await;

        let result = h.draw.draw(lottery.id, DrawTrigger::SoldOut).await.unwrap();

        let mut delivered = h
            .transport
            .wait_for(2, Duration::from_secs(2))
            .await;
        delivered.sort_unstable();
        assert_eq!(delivered, vec![1, 3]);

        let after = reload(&h, lottery.id).await;
        assert_eq!(after.status, LotteryStatus::Finished);
        assert_eq!(after.winner_id, Some(result.winner_id));
    }

    #[test]
    fn test_resolve_winner_matches_ticket_number() {
        let sold: Vec<tickets::Model> = [17, 42, 99]
            .into_iter()
            .map(|n| tickets::Model {
                id: n as i64,
                lottery_id: 1,
                user_id: 100 + n as i64,
                ticket_number: n,
                username: None,
                first_name: None,
                last_name: None,
                created_at: None,
            })
            .collect();
        assert_eq!(resolve_winner(&sold, 42).map(|t| t.user_id), Some(142));
        assert_eq!(resolve_winner(&sold, 99).map(|t| t.ticket_number), Some(99));
        assert!(resolve_winner(&sold, 1).is_none());
        assert!(resolve_winner(&sold, 0).is_none());
    }
}
