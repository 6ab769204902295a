//! `cinderctl` subcommands

pub mod metrics;
pub mod status;
