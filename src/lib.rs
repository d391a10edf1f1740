pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod model;
pub mod polygon;
pub mod runtime;
pub mod sink;
pub mod tracker;
