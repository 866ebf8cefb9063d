//! # tabmail-mime
//!
//! MIME message parsing for the `TabMail` retrieval engine.
//!
//! ## Features
//!
//! - **Message parsing**: Recursive multipart part tree from raw RFC 5322 bytes
//! - **Part inspection**: Content types, dispositions, filenames, Content-IDs
//! - **Decoding**: Base64, Quoted-Printable, RFC 2047 encoded-words
//! - **Addresses**: `"Name" <addr>` mailbox lists for sender display
//!
//! ## Quick Start
//!
//! ```ignore
//! use tabmail_mime::Message;
//!
//! let raw = b"From: Alice <alice@example.com>\r\n\
//!             Subject: Hello\r\n\
//!             Content-Type: text/plain\r\n\
//!             \r\n\
//!             Hi there!";
//!
//! let message = Message::parse(raw)?;
//! println!("Subject: {}", message.subject().unwrap_or_default());
//! println!("Body: {}", message.text_body().unwrap_or_default());
//! ```
//!
//! ### Resolving inline images
//!
//! ```ignore
//! if let Some(part) = message.find_by_content_id("logo@example.com") {
//!     let bytes = part.decode_body()?;
//!     let ext = part.content_type().sub_type;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use address::Mailbox;
pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Disposition, Message, Part, TransferEncoding};
