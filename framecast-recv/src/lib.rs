//! # framecast-recv
//!
//! Listens for chunked frames from `framecast-send`, reassembles and
//! JPEG-decodes them, and publishes per-frame statistics for whatever
//! wants to display them.

pub mod config;
pub mod service;
pub mod sink;
