//! Type-state markers for POP3 session states (RFC 1939 section 3).

/// Marker type for the AUTHORIZATION state.
///
/// Only CAPA, STLS, USER/PASS and QUIT are valid here.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorization;

/// Marker type for the TRANSACTION state.
///
/// The maildrop is locked; STAT, LIST, UIDL, RETR, TOP, NOOP, RSET and
/// QUIT are valid. QUIT from here enters the UPDATE state and closes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transaction;

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn _assert_send<T: Send>() {}
    fn _assert_sync<T: Sync>() {}

    #[test]
    fn test_state_markers_are_send_sync() {
        _assert_send::<Authorization>();
        _assert_sync::<Authorization>();
        _assert_send::<Transaction>();
        _assert_sync::<Transaction>();
    }
}
