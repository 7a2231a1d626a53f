pub mod catalog;
pub mod forecasts;
pub mod health;
pub mod sessions;
