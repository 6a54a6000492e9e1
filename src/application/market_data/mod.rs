pub mod client;
pub mod gap_detection;
pub mod market_data_client;

pub use client::BrokerClient;
pub use market_data_client::MarketDataClient;
