//! Transit network discovery.
//!
//! Crawls a public-transport data provider from a single stop and reports
//! every reachable stop, plus the travel-time edges between consecutive
//! stops along the trips it follows.

pub mod cache;
pub mod discover;
pub mod domain;
pub mod provider;
