//! Command handlers.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use tabmail_core::query::DEFAULT_PREVIEW_CHARS;
use tabmail_core::{
    AccountInfo, AccountStore, CredentialContext, EngineConfig, MailEngine, MessageContent,
    OutgoingMessage, Security, preview_text, query_view, send_message, validate_context,
};
use tracing::{info, warn};

use crate::cli::{AccountCommand, AddAccount};

/// Messages that get a body preview under `list --previews`.
const PREVIEW_ITEMS: usize = 10;

/// Shared state of one invocation.
pub struct App {
    pub config: EngineConfig,
    pub store: AccountStore,
    pub engine: MailEngine,
}

impl App {
    pub async fn load(accounts: Option<PathBuf>) -> Result<Self> {
        let config = EngineConfig::load()
            .await
            .context("failed to load configuration")?;
        let store = AccountStore::open(accounts.unwrap_or_else(AccountStore::default_path)).await;
        let engine = MailEngine::from_config(config.clone());
        Ok(Self {
            config,
            store,
            engine,
        })
    }

    fn current_account(&self) -> Result<&AccountInfo> {
        self.store
            .current()
            .ok_or_else(|| anyhow!("no account selected; run `tabmail account add` first"))
    }

    /// Points the engine at the selected account.
    async fn activate(&self) -> Result<AccountInfo> {
        let account = self.current_account()?.clone();
        self.engine.switch_account(account.to_context()).await;
        Ok(account)
    }

    pub async fn account(&mut self, command: AccountCommand) -> Result<ExitCode> {
        match command {
            AccountCommand::Add(add) => self.add_account(add).await?,
            AccountCommand::List => self.list_accounts(),
            AccountCommand::Use { id } => {
                self.store.set_current(&id).await?;
                let account = self.activate().await?;
                println!("Using {} ({})", account.display_name, account.host);
            }
            AccountCommand::Remove { id } => {
                self.store.remove(&id).await?;
                println!("Removed account {id}");
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    async fn add_account(&mut self, add: AddAccount) -> Result<()> {
        let security = if add.no_tls {
            Security::None
        } else {
            Security::from_ssl_flag(!add.insecure_starttls)
        };
        let ctx = CredentialContext::new(&add.host, add.port, security, &add.user, &add.password);

        if let Err(errors) = validate_context(&ctx) {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("invalid account: {}", messages.join(", "));
        }
        if !self.engine.test_credentials(&ctx).await {
            bail!("could not log in to {}:{} as {}", add.host, add.port, add.user);
        }

        let mut account = AccountInfo::new(&add.host, add.port, security, &add.user, &add.password);
        if let Some(name) = add.name {
            account.display_name = name;
        }
        let id = self.store.add_or_update(account).await?;
        self.store.set_current(&id).await?;
        info!(id = %id, "account stored");
        println!("Added account {id} and selected it");
        Ok(())
    }

    fn list_accounts(&self) {
        if self.store.list().is_empty() {
            println!("No accounts");
            return;
        }
        let current = self.store.current().map(|a| a.id.as_str());
        for account in self.store.list() {
            let marker = if Some(account.id.as_str()) == current { '*' } else { ' ' };
            println!(
                "{marker} {:>3}  {}  {}:{}  {}",
                account.id,
                account.display_name,
                account.host,
                account.port,
                account.security.display_name()
            );
        }
    }

    pub async fn test(&self) -> Result<ExitCode> {
        let account = self.current_account()?;
        if self.engine.test_credentials(&account.to_context()).await {
            println!("Login OK for {}", account.display_name);
            Ok(ExitCode::SUCCESS)
        } else {
            println!("Login failed for {}", account.display_name);
            Ok(ExitCode::FAILURE)
        }
    }

    pub async fn list(
        &self,
        refresh: bool,
        count: Option<usize>,
        filter: Option<&str>,
        previews: bool,
    ) -> Result<ExitCode> {
        self.activate().await?;
        let max_count = count.unwrap_or(self.config.default_max_count);
        let headers = self.engine.list_headers(refresh, max_count).await?;

        let groups = query_view(&headers, filter.unwrap_or_default());
        if groups.is_empty() {
            println!("No messages");
        }
        let mut preview_budget = if previews { PREVIEW_ITEMS } else { 0 };
        for group in groups {
            println!("{}", group.key.label());
            for header in &group.headers {
                println!(
                    "  {:>4}  {:<16}  {:<24}  {}{}",
                    header.index,
                    header.date_display(),
                    truncate(&header.sender, 24),
                    header.subject,
                    if header.has_attachments { "  [+]" } else { "" }
                );
                if preview_budget > 0 {
                    preview_budget -= 1;
                    // A preview is best-effort; the listing already succeeded
                    match self.engine.get_message(header.index).await {
                        Ok(content) => {
                            println!("        {}", preview_text(&content, DEFAULT_PREVIEW_CHARS));
                        }
                        Err(e) => warn!(index = header.index, error = %e, "preview unavailable"),
                    }
                }
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    pub async fn show(&self, index: u32, save_to: Option<&Path>, html: bool) -> Result<ExitCode> {
        self.activate().await?;
        let content = self
            .engine
            .get_message(index)
            .await
            .with_context(|| format!("failed to fetch message {index}"))?;

        print_message(&content, html);

        if let Some(dir) = save_to {
            save_attachments(&content, dir).await?;
        }
        Ok(ExitCode::SUCCESS)
    }

    pub async fn reply(&self, index: u32, body: &str) -> Result<ExitCode> {
        let account = self.activate().await?;
        let original = self
            .engine
            .get_message(index)
            .await
            .with_context(|| format!("failed to fetch message {index}"))?;

        let message = OutgoingMessage::reply_to(&original, account.username.clone(), body);
        send_message(&account.to_context(), &self.config, &message)
            .await
            .with_context(|| format!("failed to send reply to {}", message.to))?;
        println!("Reply sent to {}", message.to);
        Ok(ExitCode::SUCCESS)
    }
}

fn print_message(content: &MessageContent, html: bool) {
    println!("From:    {}", content.from);
    println!("Subject: {}", content.subject);
    if !content.date_display.is_empty() {
        println!("Date:    {}", content.date_display);
    }
    println!();

    if html || content.text_body.trim().is_empty() {
        println!("{}", content.html_body.trim_end());
    } else {
        println!("{}", content.text_body.trim_end());
    }

    if !content.attachments.is_empty() {
        println!();
        println!("Attachments:");
        for attachment in &content.attachments {
            println!("  {} ({})", attachment.filename, attachment.size_display());
        }
    }
}

async fn save_attachments(content: &MessageContent, dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;

    for attachment in &content.attachments {
        let path = unique_path(dir, &attachment.filename);
        tokio::fs::write(&path, &attachment.data)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Saved {}", path.display());
    }
    Ok(())
}

/// A path in `dir` for `filename` that does not exist yet. Directory parts
/// of the advisory name are dropped.
fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or("attachment");

    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, format!(".{ext}")),
        _ => (name, String::new()),
    };
    (1..)
        .map(|n| dir.join(format!("{stem}-{n}{ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let mut short: String = value.chars().take(max_chars.saturating_sub(1)).collect();
        short.push('~');
        short
    }
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
    use tempfile::TempDir;

    #[test]
    fn test_unique_path_strips_directories() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            unique_path(dir.path(), "../../etc/passwd"),
            dir.path().join("passwd")
        );
        assert_eq!(unique_path(dir.path(), ".."), dir.path().join("attachment"));
    }

    #[test]
    fn test_unique_path_avoids_collisions() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("report.pdf"), b"1").unwrap();
        std::fs::write(dir.path().join("report-1.pdf"), b"2").unwrap();

        assert_eq!(
            unique_path(dir.path(), "report.pdf"),
            dir.path().join("report-2.pdf")
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 24), "short");
        assert_eq!(truncate("abcdef", 4), "abc~");
    }
}
