mod balance;
mod order;
mod trade;
mod user;

pub use balance::Balance;
pub use order::{Order, OrderStatus, OrderType, Side};
pub use trade::Trade;
pub use user::User;
