pub mod answer;
pub mod health;
pub mod interrupt;
pub mod investigate;
pub mod metrics_handler;
pub mod proxy;
