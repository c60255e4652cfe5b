pub mod channel;
pub mod events;
pub mod message;
pub mod presence;
