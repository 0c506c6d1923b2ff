pub mod cli;
pub mod config;
pub mod counter;
pub mod logging;
pub mod ranking;
pub mod report;
pub mod run;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod window;
