pub mod common;
pub mod lottery;
pub mod user;

pub use common::*;
pub use lottery::*;
pub use user::*;
