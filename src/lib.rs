pub mod actions;
pub mod config;
pub mod error;
pub mod executor;
pub mod format;
pub mod game;
pub mod ledger;
pub mod locator;
pub mod logging;
pub mod notifications;
pub mod planner;
pub mod rpc;
pub mod transaction;
pub mod wallet;

pub mod test_helpers;

pub use error::{
    Error,
    Result,
};
