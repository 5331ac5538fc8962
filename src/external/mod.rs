pub mod is_gd;
pub mod random_org;
pub mod telegram;

pub use is_gd::*;
pub use random_org::*;
pub use telegram::*;
