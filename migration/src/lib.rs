pub use sea_orm_migration::prelude::*;

mod m20250901_000001_create_lottery_tables;
mod m20250902_000001_add_lottery_auto_sequence;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250901_000001_create_lottery_tables::Migration),
            Box::new(m20250902_000001_add_lottery_auto_sequence::Migration),
        ]
    }
}
