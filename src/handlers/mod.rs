pub mod admin;
pub mod lottery;
pub mod user;

pub use admin::admin_config;
pub use lottery::lottery_config;
pub use user::user_config;
