mod book;
mod orders;
mod positions;

pub use book::{BookLevel, OrderBookDepth};
pub use orders::{ActiveOrder, OrderDetail, OrderSide, OrderStatus};
pub use positions::{DayQuote, Position, PositionSide};
