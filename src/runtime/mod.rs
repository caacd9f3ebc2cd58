pub mod channel;
pub mod engine;
pub mod handlers;
pub mod notifier;
pub mod processor;
pub mod storage;
pub mod redis_storage;
