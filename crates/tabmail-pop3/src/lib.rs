//! # tabmail-pop3
//!
//! An async POP3 client library implementing RFC 1939, with CAPA (RFC 2449)
//! and STLS (RFC 2595).
//!
//! ## Features
//!
//! - **Type-state sessions**: Compile-time enforcement of the POP3 state
//!   machine (`Authorization` → `Transaction`)
//! - **TLS via rustls**: Implicit TLS (port 995) or STLS upgrade (port 110)
//! - **Timeouts everywhere**: Connect and per-response deadlines
//! - **Sans-I/O parsing**: Status lines and listings parsed from bytes
//!
//! ## Quick Start
//!
//! ```ignore
//! use tabmail_pop3::{Client, Config, Security};
//!
//! #[tokio::main]
//! async fn main() -> tabmail_pop3::Result<()> {
//!     let config = Config::new("pop.example.com", Security::Implicit);
//!
//!     let client = Client::connect(&config).await?;
//!     let mut client = client.login("user@example.com", "password").await?;
//!
//!     let stat = client.stat().await?;
//!     if stat.count > 0 {
//!         // POP3 numbers messages from 1; the newest is the highest number
//!         let raw = client.retr(stat.count).await?;
//!         println!("{} bytes", raw.len());
//!     }
//!
//!     client.quit().await
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! ┌─────────────────────┐
//! │    Authorization    │ ─── login() ───→ Transaction
//! └─────────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │     Transaction     │ ─── quit() ───→ (UPDATE, connection closed)
//! └─────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod client;
pub mod command;
pub mod connection;
mod error;
pub mod response;

pub use client::{Authorization, Client, DEFAULT_IO_TIMEOUT, Transaction};
pub use command::Command;
pub use connection::{Config, FramedStream, POP3_PORT, POP3S_PORT, Pop3Stream, Security};
pub use error::{Error, Result};
pub use response::{ScanListing, Stat, UniqueId};
