//! # autolight-agent
//!
//! Console agent that samples a screen region (or a Spout shared
//! texture), reduces it to one ambient color, and streams that color as
//! three OSC float parameters.
//!
//! ## Configuration
//!
//! A TOML file with `[capture]`, `[color]`, `[output]` and `[logging]`
//! sections. Missing keys take their defaults; `--gen-config` prints the
//! full default document.

pub mod config;
pub mod service;
