pub mod config;
pub mod dashboard;
pub mod decisions;
pub mod engine;
pub mod errors;
pub mod feed;
pub mod response_log;
pub mod runner;
pub mod state;
pub mod transducer;
