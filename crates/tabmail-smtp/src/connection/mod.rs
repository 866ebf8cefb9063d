//! SMTP connection management: configuration and the TLS/plaintext stream.

mod config;
mod stream;

pub use config::{Config, ConfigBuilder, Security};
pub use stream::{SmtpStream, connect, create_tls_connector};
