pub mod apply;
pub mod config;
pub mod index;
pub mod verify;

use anyhow::Context;

/// Runtime for driving the async indexer from a synchronous command.
pub fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start async runtime")
}
