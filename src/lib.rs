// Crate root library declaration and module exports.
pub mod cli;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod ledger;
pub mod model;
pub mod notifier;
pub mod planner;
pub mod render;
pub mod storage;
