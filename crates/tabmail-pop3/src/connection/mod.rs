//! POP3 connection management.
//!
//! This module provides connection handling for POP3 servers, including:
//! - Configuration (host, port, security mode, timeouts)
//! - TLS/plaintext stream abstraction
//! - Framed I/O for status lines and dot-terminated bodies

mod config;
mod framed;
mod stream;

pub use config::{Config, POP3_PORT, POP3S_PORT, Security};
pub use framed::FramedStream;
pub use stream::Pop3Stream;
