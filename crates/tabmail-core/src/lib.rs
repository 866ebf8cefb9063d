//! # tabmail-core
//!
//! The mail sync and content cache engine behind `TabMail`.
//!
//! This crate provides:
//! - Credential contexts and a JSON account store
//! - One-shot POP3 sessions behind the [`RemoteMailbox`] seam
//! - A TTL-bounded header cache and an index-keyed content cache
//! - Inline image materialization (`cid:` references rewritten to local asset URLs)
//! - The [`SyncEngine`] facade tying these together under one lock
//! - Pure query helpers for sorting, filtering and grouping listings
//! - Outbound replies over SMTP submission

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
pub mod assets;
mod cache;
pub mod config;
pub mod engine;
mod error;
pub mod outbound;
pub mod query;
pub mod session;

pub use account::{
    AccountInfo, AccountStore, CredentialContext, Security, ValidationError, ValidationResult,
    validate_context,
};
pub use assets::{AssetStore, MaterializeReport, PartialContentWarning, materialize};
pub use config::EngineConfig;
pub use engine::{MailEngine, SyncEngine};
pub use error::{Error, ErrorKind, Result};
pub use outbound::{OutgoingMessage, send_message};
pub use query::{GroupKey, HeaderGroup, filter_headers, group_by_month, preview_text, query_view, sort_headers};
pub use session::{
    Attachment, FetchedMessage, MessageContent, MessageHeader, Pop3Mailbox, RemoteMailbox,
};
