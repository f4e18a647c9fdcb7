pub mod analytics;
pub mod holding;
pub mod portfolio;
pub mod price;
pub mod settings;
pub mod short_interest;
pub mod stock;
pub mod transaction;
