pub mod chatstate;
pub mod message;
pub mod presence;
pub mod receipt;
pub mod router;
pub mod traits;
