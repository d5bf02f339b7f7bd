//! OSC output.
//!
//! | Module        | Purpose                                      |
//! |---------------|----------------------------------------------|
//! | `encoder`     | OSC 1.0 single-float message encoding        |
//! | `transmitter` | Rate gate, value mapping, UDP send/reconnect |

pub mod encoder;
pub mod transmitter;

pub use encoder::{decode_message, encode_message};
pub use transmitter::{OscTarget, SendOutcome, Transmitter, wire_value};
