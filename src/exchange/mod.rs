mod api;
mod rest;

pub use api::{CreateOrderRequest, ExchangeApi};
pub use rest::RestClient;
