//! Utility modules for Quote Fetch
//!
//! - `files`: ID lists, destination paths and writing images to disk
//! - `images`: image endpoint lookups and payload decoding
//! - `download`: the capped-concurrency fetch and save loop
//! - `http`: HTTP client and retry helpers

pub mod download;
pub mod files;
pub mod http;
pub mod images;
