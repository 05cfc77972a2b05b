//! # Device SDK
//!
//! Runtime for device services: periodically polls device resources,
//! optionally suppresses unchanged readings and publishes the resulting
//! events to the core data ingestion service.
//!
//! ## Features
//!
//! - One timer per (device, resource) auto event, driven by tokio
//! - On-change filtering with SHA-256 digests for binary payloads
//! - Bounded publish fan-out shared by every schedule
//! - Lock-aware executors that stop when the service is administratively locked
//! - Pluggable protocol drivers and publish gateways
//!

pub mod autoevent;
pub mod config;
pub mod driver;
mod error;
pub mod logging;
pub mod publisher;
pub mod service;

pub use error::{Error, Result};
