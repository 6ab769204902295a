//! Client library behind `cinderctl`

pub mod client;
pub mod commands;
pub mod config;
pub mod output;
