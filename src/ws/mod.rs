mod connection;
mod dispatch;
mod manager;
mod message;

pub use connection::Backoff;
pub use manager::ConnectionManager;
pub use message::{Amount, Donation, DonorMeta, MediaRequest, MessageKind, ServerMessage};
