mod chat_store;

pub use chat_store::{ChatStore, RemoteApply};
