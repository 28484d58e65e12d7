// Library root for the SmartBasket client core: data model, REST client,
// token storage, session lifecycle, basket, and configuration.

pub mod api;
pub mod basket;
pub mod config;
pub mod models;
pub mod session;
pub mod storage;
