//! Command-and-control daemon for a single robot manipulator.
//!
//! Clients connect over TCP and drive the robot through a small JSON
//! protocol; the daemon brokers a shared connection to the native motion
//! service and keeps motion commands behind an exclusive operation
//! permission.

pub mod config;
pub mod context;
pub mod dispatch;
pub mod io;
pub mod listener;
pub mod motion;
pub mod program;
pub mod robot;
pub mod session;
