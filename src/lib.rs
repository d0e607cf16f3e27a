//! Startline - launches a server process and detects readiness from its
//! own output, without polling a health endpoint.

pub mod config;
pub mod display;
pub mod install;
pub mod supervisor;
pub mod tail;
