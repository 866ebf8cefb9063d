//! `TabMail` - a terminal reader for POP3 mailboxes.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};
use commands::App;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so listings stay pipeable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabmail=info,tabmail_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut app = App::load(cli.accounts).await?;

    match cli.command {
        Command::Account(command) => app.account(command).await,
        Command::Test => app.test().await,
        Command::List {
            refresh,
            count,
            filter,
            previews,
        } => app.list(refresh, count, filter.as_deref(), previews).await,
        Command::Show {
            index,
            save_attachments,
            html,
        } => app.show(index, save_attachments.as_deref(), html).await,
        Command::Reply { index, body } => app.reply(index, &body).await,
    }
}
