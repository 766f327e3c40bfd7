pub mod constants;
pub mod ring;
pub mod sample;
pub mod clocktrack;
pub mod history;
pub mod phase;
pub mod diffseries;
pub mod coordinator;
pub mod output;
pub mod params;
pub mod net;
pub mod config;
pub mod error;
