pub mod auth;
pub mod throttle;

pub use auth::{AuthUser, StaffUser};
