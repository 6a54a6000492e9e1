pub mod broker;
pub mod core;
pub mod http;
pub mod observability;
pub mod persistence;
