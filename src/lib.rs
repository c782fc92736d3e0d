pub mod config;
pub mod duck;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod schema;
