//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tabmail")]
#[command(about = "Read a POP3 mailbox from the terminal", version)]
pub struct Cli {
    /// Account file (defaults to the per-user data directory)
    #[arg(long, global = true)]
    pub accounts: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage stored accounts
    #[command(subcommand)]
    Account(AccountCommand),

    /// Check that the current account can log in
    Test,

    /// List recent messages grouped by month
    List {
        /// Bypass the header cache
        #[arg(long)]
        refresh: bool,

        /// Number of messages to fetch
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Only show messages whose subject or sender contains this text
        #[arg(short, long)]
        filter: Option<String>,

        /// Fetch the first few messages and print a short preview of each
        #[arg(long)]
        previews: bool,
    },

    /// Show one message
    Show {
        /// Server index as printed by `list`
        index: u32,

        /// Write attachments into this directory
        #[arg(long, value_name = "DIR")]
        save_attachments: Option<PathBuf>,

        /// Print the HTML body even when a text body exists
        #[arg(long)]
        html: bool,
    },

    /// Reply to a message
    Reply {
        /// Server index as printed by `list`
        index: u32,

        /// Reply text; the original is quoted below it
        #[arg(short, long)]
        body: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum AccountCommand {
    /// Test and store an account, then select it
    Add(AddAccount),

    /// List stored accounts
    List,

    /// Select a stored account
    Use {
        /// Account id as printed by `account list`
        id: String,
    },

    /// Delete a stored account
    Remove {
        /// Account id as printed by `account list`
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct AddAccount {
    /// POP3 server hostname
    #[arg(long)]
    pub host: String,

    /// POP3 server port
    #[arg(long, default_value = "995")]
    pub port: u16,

    /// Login name
    #[arg(short, long)]
    pub user: String,

    /// Password
    #[arg(short, long)]
    pub password: String,

    /// Name shown in account lists (defaults to the login name)
    #[arg(long)]
    pub name: Option<String>,

    /// Connect in plaintext and upgrade with STLS when offered
    #[arg(long, conflicts_with = "no_tls")]
    pub insecure_starttls: bool,

    /// Never use TLS
    #[arg(long)]
    pub no_tls: bool,
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
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_account_add() {
        let cli = Cli::try_parse_from([
            "tabmail",
            "account",
            "add",
            "--host",
            "mail.example.com",
            "--user",
            "a@example.com",
            "--password",
            "x",
            "--insecure-starttls",
        ])
        .unwrap();

        let Command::Account(AccountCommand::Add(add)) = cli.command else {
            panic!("expected account add");
        };
        assert_eq!(add.port, 995);
        assert!(add.insecure_starttls);
        assert!(!add.no_tls);
    }

    #[test]
    fn test_parse_list_with_global_accounts() {
        let cli = Cli::try_parse_from([
            "tabmail", "list", "--refresh", "-n", "10", "--accounts", "/tmp/a.json",
        ])
        .unwrap();

        assert_eq!(cli.accounts, Some(PathBuf::from("/tmp/a.json")));
        assert!(matches!(
            cli.command,
            Command::List {
                refresh: true,
                count: Some(10),
                filter: None,
                previews: false
            }
        ));
    }

    #[test]
    fn test_tls_flags_conflict() {
        assert!(
            Cli::try_parse_from([
                "tabmail",
                "account",
                "add",
                "--host",
                "h",
                "--user",
                "u",
                "--password",
                "p",
                "--insecure-starttls",
                "--no-tls",
            ])
            .is_err()
        );
    }

    #[test]
    fn test_reply_requires_body() {
        assert!(Cli::try_parse_from(["tabmail", "reply", "3"]).is_err());
    }
}
