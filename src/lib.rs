//! Contact book: a JSON-file backed HTTP service and a terminal client.

pub mod client;
pub mod config;
pub mod contact;
pub mod controller;
pub mod countries;
pub mod search;
pub mod seed;
pub mod server;
pub mod store;
pub mod ui;
