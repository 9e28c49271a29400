pub mod auth;
pub mod reservation;
pub mod seat_validator;
pub mod store;
pub mod throttle;
