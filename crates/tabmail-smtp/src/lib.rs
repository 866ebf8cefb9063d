//! # tabmail-smtp
//!
//! A small async SMTP submission client (RFC 5321, RFC 6409) for sending
//! replies through the account's own server.
//!
//! ## Features
//!
//! - **Type-state transactions**: `MAIL FROM` before `RCPT TO` before `DATA`,
//!   enforced at compile time
//! - **STARTTLS via rustls**: upgrade on port 587, or implicit TLS on 465
//! - **AUTH PLAIN / LOGIN**: PLAIN preferred, LOGIN when it is all the server offers
//! - **Timeouts**: connect and per-reply deadlines
//!
//! ## Quick Start
//!
//! ```ignore
//! use tabmail_smtp::{Client, Config};
//!
//! #[tokio::main]
//! async fn main() -> tabmail_smtp::Result<()> {
//!     let config = Config::builder("smtp.example.com").build();
//!     let client = Client::connect(&config).await?;
//!     let client = client.authenticate("user@example.com", "password").await?;
//!
//!     let message = b"Subject: Hello\r\n\r\nHi there\r\n";
//!     let client = client
//!         .send_mail("user@example.com", &["friend@example.com"], message)
//!         .await?;
//!     client.quit().await
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
pub mod command;
pub mod connection;
mod error;
pub mod extension;
pub mod reply;

pub use client::{Client, DEFAULT_IO_TIMEOUT, dot_stuff, state};
pub use command::Command;
pub use connection::{Config, ConfigBuilder, Security, SmtpStream};
pub use error::{Error, Result};
pub use extension::{AuthMechanism, Extension, ServerInfo};
pub use reply::{Reply, ReplyCode};
