use crate::config::LotteryDefaultsConfig;
use crate::entities::{LotteryStatus, lottery_entity as lotteries, ticket_entity as tickets};
use crate::error::{AppError, AppResult};
use crate::models::{
    CreateLotteryRequest, LotteryResponse, LotteryResultResponse, LotteryStatsResponse,
    TicketResponse, UpdateLotteryRequest, UserStatsResponse,
};
use crate::services::{DrawService, DrawTrigger, LedgerService};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};

#[derive(Clone)]
pub struct LotteryService {
    pool: DatabaseConnection,
    ledger: LedgerService,
    draw: DrawService,
    defaults: LotteryDefaultsConfig,
}

impl LotteryService {
    pub fn new(
        pool: DatabaseConnection,
        ledger: LedgerService,
        draw: DrawService,
        defaults: LotteryDefaultsConfig,
    ) -> Self {
        Self {
            pool,
            ledger,
            draw,
            defaults,
        }
    }

    async fn find(&self, lottery_id: i64) -> AppResult<lotteries::Model> {
        lotteries::Entity::find_by_id(lottery_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lottery {lottery_id} not found")))
    }

    async fn snapshot(&self, lottery: lotteries::Model) -> AppResult<LotteryResponse> {
        let participants = self.ledger.participant_count(lottery.id).await?;
        let winning_ticket = match lottery.winner_ticket_number {
            Some(number) => self.ledger.find_ticket(lottery.id, number).await?,
            None => None,
        };
        Ok(LotteryResponse::new(
            lottery,
            participants,
            winning_ticket.as_ref(),
        ))
    }

    pub async fn get_lottery(&self, lottery_id: i64) -> AppResult<LotteryResponse> {
        let lottery = self.find(lottery_id).await?;
        self.snapshot(lottery).await
    }

    pub async fn get_result(&self, lottery_id: i64) -> AppResult<LotteryResultResponse> {
        Ok(self.get_lottery(lottery_id).await?.into())
    }

    /// 活跃的抽奖在前 (按 id), 已结束的按 finished_at 倒序
    pub async fn list_lotteries(&self) -> AppResult<Vec<LotteryResponse>> {
        if self.defaults.auto_create {
            self.ensure_open_lottery().await?;
        }

        let active = lotteries::Entity::find()
            .filter(lotteries::Column::Status.ne(LotteryStatus::Finished))
            .order_by_asc(lotteries::Column::Id)
            .all(&self.pool)
            .await?;
        let finished = lotteries::Entity::find()
            .filter(lotteries::Column::Status.eq(LotteryStatus::Finished))
            .order_by_desc(lotteries::Column::FinishedAt)
            .order_by_desc(lotteries::Column::Id)
            .all(&self.pool)
            .await?;

        let mut list = Vec::with_capacity(active.len() + finished.len());
        for lottery in active.into_iter().chain(finished) {
            list.push(self.snapshot(lottery).await?);
        }
        Ok(list)
    }

    /// Create `Lottery #<n>` with the configured defaults when every lottery
    /// is finished. `n` is the number of lotteries ever created plus one; a
    /// concurrent creator that took the same `n` wins through the unique
    /// `auto_sequence` index and this call returns `None`.
    pub async fn ensure_open_lottery(&self) -> AppResult<Option<lotteries::Model>> {
        let txn = self.pool.begin().await?;

        // drawing 中的抽奖也算活跃, 失败时会回到 open
        let active = lotteries::Entity::find()
            .filter(lotteries::Column::Status.ne(LotteryStatus::Finished))
            .count(&txn)
            .await?;
        if active > 0 {
            txn.commit().await?;
            return Ok(None);
        }

        let sequence = lotteries::Entity::find().count(&txn).await? as i64 + 1;
        let inserted = lotteries::ActiveModel {
            name: Set(format!("Lottery #{sequence}")),
            ticket_price: Set(self.defaults.default_ticket_price),
            max_tickets: Set(self.defaults.default_max_tickets),
            tickets_sold: Set(0),
            status: Set(LotteryStatus::Open),
            created_at: Set(Some(Utc::now())),
            auto_sequence: Set(Some(sequence)),
            ..Default::default()
        }
        .insert(&txn)
        .await;

        let lottery = match inserted {
            Ok(lottery) => lottery,
            Err(e) => {
                return match e.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(_)) => {
                        log::info!("Lottery #{sequence} was auto-created concurrently");
                        Ok(None)
                    }
                    _ => Err(e.into()),
                };
            }
        };
        txn.commit().await?;

        log::info!("Auto-created lottery {} ({})", lottery.id, lottery.name);
        Ok(Some(lottery))
    }

    pub async fn create_lottery(&self, req: CreateLotteryRequest) -> AppResult<lotteries::Model> {
        let name = validate_definition(&req.name, req.ticket_price, req.max_tickets)?;

        let lottery = lotteries::ActiveModel {
            name: Set(name),
            ticket_price: Set(req.ticket_price),
            max_tickets: Set(req.max_tickets),
            tickets_sold: Set(0),
            status: Set(LotteryStatus::Open),
            created_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(&self.pool)
        .await?;

        log::info!(
            "Created lottery {} '{}' ({} tickets at {})",
            lottery.id,
            lottery.name,
            lottery.max_tickets,
            lottery.ticket_price
        );
        Ok(lottery)
    }

    /// Edit an open lottery. Capacity may shrink down to `tickets_sold`; if it
    /// lands exactly there the lottery is drawn.
    pub async fn update_lottery(
        &self,
        lottery_id: i64,
        req: UpdateLotteryRequest,
    ) -> AppResult<LotteryResponse> {
        let name = validate_definition(&req.name, req.ticket_price, req.max_tickets)?;

        let res = lotteries::Entity::update_many()
            .col_expr(lotteries::Column::Name, Expr::value(name))
            .col_expr(lotteries::Column::TicketPrice, Expr::value(req.ticket_price))
            .col_expr(lotteries::Column::MaxTickets, Expr::value(req.max_tickets))
            .filter(lotteries::Column::Id.eq(lottery_id))
            .filter(lotteries::Column::Status.eq(LotteryStatus::Open))
            .filter(lotteries::Column::TicketsSold.lte(req.max_tickets))
            .exec(&self.pool)
            .await?;

        let lottery = self.find(lottery_id).await?;
        if res.rows_affected != 1 {
            return Err(if lottery.status != LotteryStatus::Open {
                AppError::Conflict(format!("Lottery {lottery_id} can no longer be edited"))
            } else {
                AppError::Conflict(format!(
                    "max_tickets {} is below the {} tickets already sold",
                    req.max_tickets, lottery.tickets_sold
                ))
            });
        }
        log::info!("Updated lottery {lottery_id}");

        if lottery.tickets_sold > 0 && lottery.is_sold_out() {
            match self.draw.draw(lottery_id, DrawTrigger::SoldOut).await {
                Ok(_) | Err(AppError::AlreadyFinished(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.get_lottery(lottery_id).await
    }

    pub async fn list_tickets(&self, lottery_id: i64) -> AppResult<Vec<TicketResponse>> {
        self.find(lottery_id).await?;
        let list = self.ledger.tickets(lottery_id).await?;
        Ok(list.into_iter().map(TicketResponse::from).collect())
    }

    pub async fn lottery_stats(&self, lottery_id: i64) -> AppResult<LotteryStatsResponse> {
        let lottery = self.find(lottery_id).await?;
        Ok(LotteryStatsResponse {
            tickets_sold: lottery.tickets_sold,
            revenue: lottery.tickets_sold as i64 * lottery.ticket_price,
        })
    }

    pub async fn user_stats(&self, user_id: i64) -> AppResult<UserStatsResponse> {
        let wins = lotteries::Entity::find()
            .filter(lotteries::Column::WinnerId.eq(user_id))
            .count(&self.pool)
            .await?;
        let ticket_count = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(user_id))
            .count(&self.pool)
            .await?;

        let joined: Vec<i64> = tickets::Entity::find()
            .filter(tickets::Column::UserId.eq(user_id))
            .select_only()
            .column(tickets::Column::LotteryId)
            .distinct()
            .into_tuple()
            .all(&self.pool)
            .await?;
        let active_lotteries = if joined.is_empty() {
            0
        } else {
            lotteries::Entity::find()
                .filter(lotteries::Column::Id.is_in(joined))
                .filter(lotteries::Column::Status.ne(LotteryStatus::Finished))
                .count(&self.pool)
                .await?
        };

        Ok(UserStatsResponse {
            wins: wins as i64,
            tickets: ticket_count as i64,
            active_lotteries: active_lotteries as i64,
        })
    }

    /// Startup repair for a process that died mid-draw: release `drawing`
    /// claims and stamp finished rows that lack `finished_at`.
    pub async fn recover_interrupted_draws(&self) -> AppResult<u64> {
        let released = lotteries::Entity::update_many()
            .col_expr(
                lotteries::Column::Status,
                Expr::value(LotteryStatus::Open.to_value()),
            )
            .filter(lotteries::Column::Status.eq(LotteryStatus::Drawing))
            .filter(lotteries::Column::WinnerId.is_null())
            .exec(&self.pool)
            .await?;

        let stamped = lotteries::Entity::update_many()
            .col_expr(lotteries::Column::FinishedAt, Expr::value(Utc::now()))
            .filter(lotteries::Column::Status.eq(LotteryStatus::Finished))
            .filter(lotteries::Column::FinishedAt.is_null())
            .exec(&self.pool)
            .await?;

        if released.rows_affected > 0 || stamped.rows_affected > 0 {
            log::warn!(
                "Recovered {} interrupted draws, stamped {} finished lotteries",
                released.rows_affected,
                stamped.rows_affected
            );
        }
        Ok(released.rows_affected)
    }
}

fn validate_definition(name: &str, ticket_price: i64, max_tickets: i32) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::ValidationError("Lottery name is required".into()));
    }
    if ticket_price < 0 {
        return Err(AppError::ValidationError(
            "ticket_price must not be negative".into(),
        ));
    }
    if max_tickets < 1 {
        return Err(AppError::ValidationError(
            "max_tickets must be at least 1".into(),
        ));
    }
    Ok(name.to_string())
}
