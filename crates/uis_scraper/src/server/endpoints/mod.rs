pub mod status;
pub mod success_rates;
