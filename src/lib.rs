// lib.rs
// Live and historical crypto spot prices from the dashboard backend. The live
// view keeps a bounded window per tracked symbol (series), fed by a
// fixed-interval poller and drawn by render on the terminal set up by tui.

pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod poller;
pub mod render;
pub mod rest;
pub mod series;
pub mod store;
pub mod telemetry;
pub mod tui;
pub mod types;
