#[macro_use]
extern crate tracing;

pub mod cache;
pub mod config;
pub mod dns;
pub mod dns_check;
pub mod error;
pub mod health;
pub mod mutator;
pub mod reconcile;
pub mod scheduler;
