//! Inline asset materialization.
//!
//! HTML bodies refer to embedded images as `src="cid:<content-id>"`. The
//! materializer writes each referenced part to the asset store under a
//! deterministic name and points the attribute at the store's virtual URL,
//! so the output HTML is a pure function of the input message.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tabmail_mime::Message;
use tracing::{debug, warn};

use crate::Result;
use crate::config::EngineConfig;

static INLINE_REF: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r#"(?i)src\s*=\s*(?:"cid:([^"]*)"|'cid:([^']*)')"#));

/// Directory of materialized assets plus the URL scheme that serves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetStore {
    dir: PathBuf,
    scheme: String,
    root: String,
    folder: String,
}

impl AssetStore {
    /// Creates a store writing to `dir`, served as
    /// `{scheme}://{root}/{folder}/{name}`.
    #[must_use]
    pub fn new(
        dir: impl Into<PathBuf>,
        scheme: impl Into<String>,
        root: impl Into<String>,
        folder: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            scheme: scheme.into(),
            root: root.into(),
            folder: folder.into(),
        }
    }

    /// Store described by the `asset_*` settings.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.asset_dir.clone(),
            config.asset_scheme.clone(),
            config.asset_root.clone(),
            config.asset_folder.clone(),
        )
    }

    /// Directory files are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates or replaces `name` with `bytes`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Virtual URL of a written file.
    #[must_use]
    pub fn url_for(&self, name: &str) -> String {
        let folder = self.folder.trim_matches('/');
        if folder.is_empty() {
            format!("{}://{}/{name}", self.scheme, self.root)
        } else {
            format!("{}://{}/{folder}/{name}", self.scheme, self.root)
        }
    }
}

/// An inline reference that was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialContentWarning {
    /// The referenced content id.
    pub content_id: String,
    /// Why it could not be materialized.
    pub reason: String,
}

impl fmt::Display for PartialContentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inline image cid:{} left unresolved: {}", self.content_id, self.reason)
    }
}

/// Output of [`materialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Rewritten HTML.
    pub html: String,
    /// Files written, one per distinct reference.
    pub written: Vec<PathBuf>,
    /// References left as they were.
    pub warnings: Vec<PartialContentWarning>,
}

/// Rewrites `cid:` image references in `html` to asset URLs, writing the
/// referenced parts of `message` into `store`.
///
/// Never fails: a reference that cannot be resolved or written is left
/// unchanged and reported in [`MaterializeReport::warnings`]. Blank HTML is
/// returned as-is without touching the store.
pub async fn materialize(html: &str, message: &Message, store: &AssetStore) -> MaterializeReport {
    let mut report = MaterializeReport {
        html: html.to_string(),
        ..MaterializeReport::default()
    };
    if html.trim().is_empty() {
        return report;
    }

    let pattern = match &*INLINE_REF {
        Ok(re) => re,
        Err(e) => {
            warn!(error = %e, "inline reference pattern unavailable");
            return report;
        }
    };

    // Resolve each distinct reference once, then rewrite in a single pass
    let mut resolved: HashMap<String, String> = HashMap::new();
    let mut seen = HashSet::new();
    for caps in pattern.captures_iter(html) {
        let Some(whole) = caps.get(0) else { continue };
        let key = whole.as_str().to_ascii_lowercase();
        if !seen.insert(key.clone()) {
            continue;
        }

        let (quote, raw_id) = match (caps.get(1), caps.get(2)) {
            (Some(id), _) => ('"', id.as_str()),
            (None, Some(id)) => ('\'', id.as_str()),
            (None, None) => continue,
        };
        let content_id = raw_id.trim_matches(['<', '>', ' ']);

        match materialize_one(content_id, message, store).await {
            Ok((path, url)) => {
                resolved.insert(key, format!("src={quote}{url}{quote}"));
                if !report.written.contains(&path) {
                    report.written.push(path);
                }
            }
            Err(reason) => report.warnings.push(PartialContentWarning {
                content_id: content_id.to_string(),
                reason,
            }),
        }
    }

    if !resolved.is_empty() {
        report.html = pattern
            .replace_all(html, |caps: &Captures<'_>| {
                let whole = &caps[0];
                resolved
                    .get(&whole.to_ascii_lowercase())
                    .map_or_else(|| whole.to_string(), Clone::clone)
            })
            .into_owned();
    }

    for warning in &report.warnings {
        warn!(%warning, "partial content");
    }
    debug!(
        written = report.written.len(),
        unresolved = report.warnings.len(),
        "materialized inline images"
    );
    report
}

async fn materialize_one(
    content_id: &str,
    message: &Message,
    store: &AssetStore,
) -> std::result::Result<(PathBuf, String), String> {
    let part = message
        .find_by_content_id(content_id)
        .ok_or_else(|| "no part with this content id".to_string())?;
    let bytes = part.decode_body().map_err(|e| e.to_string())?;

    let name = asset_file_name(content_id, &part.content_type().sub_type);
    let path = store
        .write(&name, &bytes)
        .await
        .map_err(|e| e.to_string())?;
    Ok((path, store.url_for(&name)))
}

/// `inline_<id>.<subtype>`, both sanitized, with `bin` for a missing
/// subtype.
#[must_use]
pub fn asset_file_name(content_id: &str, sub_type: &str) -> String {
    let ext = sanitize_id(sub_type.trim().trim_matches('.'));
    let ext = if ext.is_empty() { "bin".to_string() } else { ext };
    format!("inline_{}.{ext}", sanitize_id(content_id))
}

/// Replaces every character outside `[A-Za-z0-9_.-]` with `_`.
#[must_use]
pub fn sanitize_id(content_id: &str) -> String {
    content_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

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
    use proptest::prelude::*;
    use tempfile::TempDir;

    const RELATED: &[u8] = b"From: a@example.com\r\n\
Subject: pics\r\n\
Content-Type: multipart/related; boundary=\"rel\"\r\n\
\r\n\
--rel\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>x</p>\r\n\
--rel\r\n\
Content-Type: image/png\r\n\
Content-ID: <logo@example>\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw0K\r\n\
--rel\r\n\
Content-Type: image/gif\r\n\
Content-ID: <Spacer 1>\r\n\
\r\n\
GIF89a\r\n\
--rel--\r\n";

    fn store(dir: &TempDir) -> AssetStore {
        AssetStore::new(dir.path().join("InlineCache"), "https", "assets", "InlineCache")
    }

    fn message() -> Message {
        Message::parse(RELATED).unwrap()
    }

    #[test]
    fn test_url_for() {
        let store = AssetStore::new("/tmp/x", "https", "assets", "InlineCache");
        assert_eq!(
            store.url_for("inline_a.png"),
            "https://assets/InlineCache/inline_a.png"
        );

        let bare = AssetStore::new("/tmp/x", "app", "media", "");
        assert_eq!(bare.url_for("f.bin"), "app://media/f.bin");
    }

    #[test]
    fn test_file_name() {
        assert_eq!(asset_file_name("logo@example", "png"), "inline_logo_example.png");
        assert_eq!(asset_file_name("a b/c", ""), "inline_a_b_c.bin");
        assert_eq!(sanitize_id("ok-1_2.x"), "ok-1_2.x");
    }

    #[test]
    fn test_file_name_extension_cannot_leave_directory() {
        let name = asset_file_name("logo", "png/../../x");
        assert_eq!(name, "inline_logo.png_.._.._x");
        assert!(!name.contains('/'));

        assert_eq!(asset_file_name("logo", "svg+xml"), "inline_logo.svg_xml");
        assert_eq!(asset_file_name("logo", " .. "), "inline_logo.bin");
    }

    #[tokio::test]
    async fn test_rewrites_double_quoted_reference() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let html = r#"<img SRC = "cid:logo@example"><img src="cid:logo@example">"#;

        let report = materialize(html, &message(), &store).await;

        assert!(report.warnings.is_empty());
        assert_eq!(report.written.len(), 1);
        assert_eq!(
            report.html,
            r#"<img src="https://assets/InlineCache/inline_logo_example.png"><img src="https://assets/InlineCache/inline_logo_example.png">"#
        );

        let written = tokio::fs::read(&report.written[0]).await.unwrap();
        assert_eq!(written, vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A]);
        assert!(report.written[0].ends_with("InlineCache/inline_logo_example.png"));
    }

    #[tokio::test]
    async fn test_single_quotes_and_brackets() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let html = "<img src='cid:<spacer 1>'>";

        let report = materialize(html, &message(), &store).await;
        assert_eq!(
            report.html,
            "<img src='https://assets/InlineCache/inline_spacer_1.gif'>"
        );
    }

    #[tokio::test]
    async fn test_unresolved_reference_left_untouched() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let html = r#"<img src="cid:missing"><img src="cid:logo@example">"#;

        let report = materialize(html, &message(), &store).await;
        assert!(report.html.starts_with(r#"<img src="cid:missing">"#));
        assert!(report.html.contains("inline_logo_example.png"));
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].content_id, "missing");
    }

    #[tokio::test]
    async fn test_case_variants_share_one_asset() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let html = r#"<img src="cid:logo@example"><img SRC="CID:LOGO@EXAMPLE">"#;

        let report = materialize(html, &message(), &store).await;
        assert_eq!(report.written.len(), 1);
        assert_eq!(
            report.html.matches(r#"src="https://assets/InlineCache/inline_logo_example.png""#).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_output_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let html = r#"<img src="cid:logo@example"> <img src='cid:Spacer 1'>"#;

        let first = materialize(html, &message(), &store).await;
        let second = materialize(html, &message(), &store).await;
        assert_eq!(first.html, second.html);
        assert_eq!(first.written, second.written);
    }

    #[tokio::test]
    async fn test_blank_html_does_no_io() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let report = materialize("  \r\n", &message(), &store).await;
        assert_eq!(report.html, "  \r\n");
        assert!(!store.dir().exists());
    }

    #[tokio::test]
    async fn test_write_failure_becomes_warning() {
        let dir = TempDir::new().unwrap();
        // A regular file where the asset directory should be
        let blocker = dir.path().join("InlineCache");
        tokio::fs::write(&blocker, b"not a dir").await.unwrap();
        let store = store(&dir);

        let html = r#"<img src="cid:logo@example">"#;
        let report = materialize(html, &message(), &store).await;
        assert_eq!(report.html, html);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.written.is_empty());
    }

    proptest! {
        #[test]
        fn sanitize_keeps_only_safe_chars(id in ".*") {
            let clean = sanitize_id(&id);
            prop_assert_eq!(clean.chars().count(), id.chars().count());
            prop_assert!(clean
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')));
        }
    }
}
