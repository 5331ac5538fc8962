use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Lotteries {
    Table,
    AutoSequence,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 自动创建的抽奖编号, 管理员创建的为 NULL
        manager
            .alter_table(
                Table::alter()
                    .table(Lotteries::Table)
                    .add_column(
                        ColumnDef::new(Lotteries::AutoSequence)
                            .big_integer()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Two concurrent auto-creates pick the same number; only one insert lands
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_lotteries_auto_sequence")
                    .table(Lotteries::Table)
                    .col(Lotteries::AutoSequence)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_lotteries_auto_sequence")
                    .table(Lotteries::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Lotteries::Table)
                    .drop_column(Lotteries::AutoSequence)
                    .to_owned(),
            )
            .await
    }
}
