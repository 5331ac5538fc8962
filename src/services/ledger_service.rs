use crate::entities::{
    LotteryStatus, lottery_entity as lotteries, ticket_entity as tickets, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::models::BuyerProfile;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
    TransactionTrait,
};
use std::collections::HashSet;

/// Result of a committed reservation
#[derive(Debug, Clone)]
pub struct Reservation {
    pub numbers: Vec<i32>,
    /// Lottery row as committed together with the tickets
    pub lottery: lotteries::Model,
}

/// 票据账本: 唯一的票号归属记录
#[derive(Clone)]
pub struct LedgerService {
    pool: DatabaseConnection,
}

impl LedgerService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// Reserve `numbers` for `buyer_id` in one transaction: all of them or none.
    ///
    /// 步骤:
    /// 1. 条件更新 tickets_sold (status = open, 不超过 max_tickets, 票号在范围内);
    ///    事务的第一条语句就是写, 先拿到该抽奖的行锁 / SQLite 写锁
    /// 2. 更新失败时重新读取, 区分不存在 / 越界 / 已关闭 / 容量不足
    /// 3. 写入/更新买家资料 (同一事务)
    /// 4. 检查票号是否已被占用
    /// 5. 插入票据并提交
    pub async fn reserve(
        &self,
        lottery_id: i64,
        buyer_id: i64,
        profile: &BuyerProfile,
        numbers: &[i32],
    ) -> AppResult<Reservation> {
        let (Some(&lowest), Some(&highest)) = (numbers.iter().min(), numbers.iter().max()) else {
            return Err(AppError::ValidationError("No tickets selected".into()));
        };
        if lowest < 1 {
            return Err(AppError::ValidationError(format!(
                "Ticket number {lowest} is outside the pool"
            )));
        }
        let requested = numbers.len() as i32;

        let txn = self.pool.begin().await?;

        let claimed = lotteries::Entity::update_many()
            .col_expr(
                lotteries::Column::TicketsSold,
                Expr::col(lotteries::Column::TicketsSold).add(requested),
            )
            .filter(lotteries::Column::Id.eq(lottery_id))
            .filter(lotteries::Column::Status.eq(LotteryStatus::Open))
            .filter(lotteries::Column::MaxTickets.gte(highest))
            .filter(
                Expr::expr(Expr::col(lotteries::Column::TicketsSold).add(requested))
                    .lte(Expr::col(lotteries::Column::MaxTickets)),
            )
            .exec(&txn)
            .await?;

        if claimed.rows_affected != 1 {
            let current = lotteries::Entity::find_by_id(lottery_id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Lottery {lottery_id} not found")))?;
            return Err(if highest > current.max_tickets {
                AppError::ValidationError(format!(
                    "Ticket number {highest} is outside 1..={}",
                    current.max_tickets
                ))
            } else if current.status != LotteryStatus::Open {
                AppError::Conflict(format!("Lottery {lottery_id} is closed for sales"))
            } else {
                AppError::CapacityExceeded {
                    requested,
                    remaining: current.remaining(),
                }
            });
        }

        upsert_buyer(&txn, buyer_id, profile).await?;

        let mut taken: Vec<i32> = tickets::Entity::find()
            .filter(tickets::Column::LotteryId.eq(lottery_id))
            .filter(tickets::Column::TicketNumber.is_in(numbers.iter().copied()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|t| t.ticket_number)
            .collect();
        if !taken.is_empty() {
            taken.sort_unstable();
            return Err(already_sold(&taken));
        }

        let now = Utc::now();
        let rows = numbers.iter().map(|&number| tickets::ActiveModel {
            lottery_id: Set(lottery_id),
            user_id: Set(buyer_id),
            ticket_number: Set(number),
            username: Set(profile.username.clone()),
            first_name: Set(profile.first_name.clone()),
            last_name: Set(profile.last_name.clone()),
            created_at: Set(Some(now)),
            ..Default::default()
        });
        tickets::Entity::insert_many(rows)
            .exec_without_returning(&txn)
            .await
            .map_err(|e| match e.sql_err() {
                // lost a race on the unique (lottery_id, ticket_number) index
                Some(SqlErr::UniqueConstraintViolation(_)) => already_sold(numbers),
                _ => AppError::from(e),
            })?;

        let lottery = lotteries::Entity::find_by_id(lottery_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Lottery {lottery_id} not found")))?;

        txn.commit().await?;

        log::info!(
            "Reserved tickets {:?} in lottery {} for user {} ({}/{})",
            numbers,
            lottery_id,
            buyer_id,
            lottery.tickets_sold,
            lottery.max_tickets
        );

        Ok(Reservation {
            numbers: numbers.to_vec(),
            lottery,
        })
    }

    /// All tickets of a lottery ordered by ticket number
    pub async fn tickets(&self, lottery_id: i64) -> AppResult<Vec<tickets::Model>> {
        let list = tickets::Entity::find()
            .filter(tickets::Column::LotteryId.eq(lottery_id))
            .order_by_asc(tickets::Column::TicketNumber)
            .all(&self.pool)
            .await?;
        Ok(list)
    }

    pub async fn find_ticket(
        &self,
        lottery_id: i64,
        ticket_number: i32,
    ) -> AppResult<Option<tickets::Model>> {
        let ticket = tickets::Entity::find()
            .filter(tickets::Column::LotteryId.eq(lottery_id))
            .filter(tickets::Column::TicketNumber.eq(ticket_number))
            .one(&self.pool)
            .await?;
        Ok(ticket)
    }

    /// One ticket per distinct buyer (their earliest), in purchase order
    pub async fn participants(&self, lottery_id: i64) -> AppResult<Vec<tickets::Model>> {
        let list = tickets::Entity::find()
            .filter(tickets::Column::LotteryId.eq(lottery_id))
            .order_by_asc(tickets::Column::Id)
            .all(&self.pool)
            .await?;

        let mut seen = HashSet::new();
        Ok(list
            .into_iter()
            .filter(|t| seen.insert(t.user_id))
            .collect())
    }

    pub async fn participant_count(&self, lottery_id: i64) -> AppResult<i64> {
        let count = tickets::Entity::find()
            .filter(tickets::Column::LotteryId.eq(lottery_id))
            .select_only()
            .column(tickets::Column::UserId)
            .distinct()
            .count(&self.pool)
            .await?;
        Ok(count as i64)
    }
}

fn already_sold(numbers: &[i32]) -> AppError {
    let list = numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    AppError::Conflict(format!("Ticket {list} already sold"))
}

/// Create the buyer if absent, otherwise refresh the profile fields that were
/// supplied and differ. Runs inside the caller's transaction.
async fn upsert_buyer(
    txn: &DatabaseTransaction,
    user_id: i64,
    profile: &BuyerProfile,
) -> Result<(), DbErr> {
    let now = Utc::now();

    let Some(existing) = users::Entity::find_by_id(user_id).one(txn).await? else {
        users::Entity::insert(users::ActiveModel {
            user_id: Set(user_id),
            username: Set(profile.username.clone()),
            first_name: Set(profile.first_name.clone()),
            last_name: Set(profile.last_name.clone()),
            ton_wallet_address: Set(None),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
        })
        .on_conflict(
            OnConflict::column(users::Column::UserId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(txn)
        .await?;
        return Ok(());
    };

    fn changed(new: &Option<String>, old: &Option<String>) -> Option<String> {
        new.as_ref()
            .filter(|v| !v.is_empty() && Some(*v) != old.as_ref())
            .cloned()
    }

    let username = changed(&profile.username, &existing.username);
    let first_name = changed(&profile.first_name, &existing.first_name);
    let last_name = changed(&profile.last_name, &existing.last_name);
    if username.is_none() && first_name.is_none() && last_name.is_none() {
        return Ok(());
    }

    let mut am = existing.into_active_model();
    if let Some(v) = username {
        am.username = Set(Some(v));
    }
    if let Some(v) = first_name {
        am.first_name = Set(Some(v));
    }
    if let Some(v) = last_name {
        am.last_name = Set(Some(v));
    }
    am.updated_at = Set(Some(now));
    am.update(txn).await?;
    Ok(())
}
