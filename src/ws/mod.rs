mod message_types;
mod ws_manager;

pub use message_types::{Message, OrderUpdateEvent, TickerEvent};
pub use ws_manager::{Subscription, WsManager};
