//! HTTP front end for the fault remediation dispatcher

pub mod api;
pub mod config;
