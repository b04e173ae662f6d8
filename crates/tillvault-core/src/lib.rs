pub mod backup;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod history;
pub mod notify;
pub mod ops;
pub mod payload;
pub mod restore;
pub mod scheduler;
pub mod storage;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;
