pub mod lotteries;
pub mod tickets;
pub mod users;

pub use lotteries::LotteryStatus;

pub use lotteries as lottery_entity;
pub use tickets as ticket_entity;
pub use users as user_entity;
