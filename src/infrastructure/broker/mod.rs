pub mod oanda_client;

pub use oanda_client::OandaBrokerClient;
