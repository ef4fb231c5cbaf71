//! # API Route Modules
//!
//! - `records`: citizen and service-request collections, one router per
//!   entity kind.
//! - `health`: encryption health report.

pub mod health;
pub mod records;
