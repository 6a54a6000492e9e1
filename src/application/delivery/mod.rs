pub mod channel;
pub mod dispatcher;
pub mod payload;

pub use channel::{DeliveryChannel, DeliveryResponse, TransportError};
pub use dispatcher::DeliveryDispatcher;
pub use payload::SignalPayload;
