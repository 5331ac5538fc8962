pub mod auth;
pub mod cors;

pub use auth::AdminGuard;
pub use cors::create_cors;
