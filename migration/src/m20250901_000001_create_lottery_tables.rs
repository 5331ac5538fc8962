use sea_orm_migration::prelude::*;

/// Buyers, created lazily on first purchase
#[derive(DeriveIden)]
enum Users {
    Table,
    UserId,
    Username,
    FirstName,
    LastName,
    TonWalletAddress,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Lotteries {
    Table,
    Id,
    Name,
    TicketPrice,
    MaxTickets,
    TicketsSold,
    Status,
    WinnerId,
    WinnerTicketNumber,
    RandomLink,
    CreatedAt,
    FinishedAt,
}

/// Sold tickets; buyer display fields are a snapshot taken at purchase time
#[derive(DeriveIden)]
enum Tickets {
    Table,
    Id,
    LotteryId,
    UserId,
    TicketNumber,
    Username,
    FirstName,
    LastName,
    CreatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::UserId)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Username).string_len(255).null())
                    .col(ColumnDef::new(Users::FirstName).string_len(255).null())
                    .col(ColumnDef::new(Users::LastName).string_len(255).null())
                    .col(
                        ColumnDef::new(Users::TonWalletAddress)
                            .string_len(128)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Lotteries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Lotteries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Lotteries::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Lotteries::TicketPrice)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Lotteries::MaxTickets).integer().not_null())
                    .col(
                        ColumnDef::new(Lotteries::TicketsSold)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    // open | drawing | finished
                    .col(
                        ColumnDef::new(Lotteries::Status)
                            .string_len(16)
                            .not_null()
                            .default("open"),
                    )
                    .col(ColumnDef::new(Lotteries::WinnerId).big_integer().null())
                    .col(
                        ColumnDef::new(Lotteries::WinnerTicketNumber)
                            .integer()
                            .null(),
                    )
                    .col(ColumnDef::new(Lotteries::RandomLink).text().null())
                    .col(
                        ColumnDef::new(Lotteries::CreatedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Lotteries::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tickets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Tickets::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Tickets::LotteryId).big_integer().not_null())
                    .col(ColumnDef::new(Tickets::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Tickets::TicketNumber).integer().not_null())
                    .col(ColumnDef::new(Tickets::Username).string_len(255).null())
                    .col(ColumnDef::new(Tickets::FirstName).string_len(255).null())
                    .col(ColumnDef::new(Tickets::LastName).string_len(255).null())
                    .col(
                        ColumnDef::new(Tickets::CreatedAt)
                            .timestamp_with_time_zone()
                            .null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tickets_lottery_id")
                            .from(Tickets::Table, Tickets::LotteryId)
                            .to(Lotteries::Table, Lotteries::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tickets_user_id")
                            .from(Tickets::Table, Tickets::UserId)
                            .to(Users::Table, Users::UserId),
                    )
                    .to_owned(),
            )
            .await?;

        // A ticket number can be sold only once per lottery
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_lottery_number_unique")
                    .table(Tickets::Table)
                    .col(Tickets::LotteryId)
                    .col(Tickets::TicketNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tickets_user_id")
                    .table(Tickets::Table)
                    .col(Tickets::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_lotteries_status")
                    .table(Lotteries::Table)
                    .col(Lotteries::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tickets::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Lotteries::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}
