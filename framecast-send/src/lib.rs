//! # framecast-send
//!
//! Captures frames from the synthetic test pattern, JPEG-encodes them
//! at an adaptively chosen quality, and streams them over UDP to a
//! single `framecast-recv` peer.

pub mod config;
pub mod service;
