pub mod config;
pub mod dsl;
pub mod error;
pub mod manipulators;
pub mod message;
pub mod process;
pub mod runtime;
pub mod task;
