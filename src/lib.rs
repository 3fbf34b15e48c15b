//! HTTP endpoint status checks with pluggable output.
//!
//! Probes a set of targets concurrently, formats the results (tab, CSV,
//! JSON, or a user template), and delivers them to one or more sinks:
//! the console, a Slack webhook, an HTTP callback, or the in-process
//! cache behind the `/data` server endpoint.
//!
//! # Security
//!
//! TLS certificate verification is disabled for all outbound requests
//! so that internal endpoints with self-signed certificates can be
//! monitored. Do not point this tool at untrusted networks.

pub mod cli;
pub mod config;
pub mod console;
pub mod dashboard;
pub mod executor;
pub mod output;
pub mod probe;
pub mod server;
pub mod sink;
pub mod target;
