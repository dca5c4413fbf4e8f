pub mod collector;
pub mod config;
pub mod constants;
pub mod declarations;
pub mod docker;
pub mod error;
pub mod generator;
pub mod harvester;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod tree;
