pub mod draw_service;
pub mod ledger_service;
pub mod lottery_service;
pub mod notification_service;
pub mod purchase_service;
pub mod random_source;

pub use draw_service::*;
pub use ledger_service::*;
pub use lottery_service::*;
pub use notification_service::*;
pub use purchase_service::*;
pub use random_source::*;
