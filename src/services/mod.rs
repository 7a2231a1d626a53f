pub mod catalog;
pub mod forecast;
pub mod history;
pub mod persistence;
pub mod sessions;
