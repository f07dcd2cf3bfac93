//! Customer-segmentation dashboard client.
//!
//! Fetches segment details and three chart payloads from a segmentation
//! backend, derives an overview, and renders cards, charts and a segment
//! table into a [`display::DisplayTarget`] on a periodic schedule.

pub mod api;
pub mod cli;
pub mod config;
pub mod controller;
pub mod display;
pub mod format;
pub mod history;
pub mod model;
pub mod overview;
pub mod report;
pub mod scheduler;
pub mod web;
