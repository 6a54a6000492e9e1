pub mod webhook_channel;

pub use webhook_channel::WebhookChannel;
