//! Implementation for the TRANSACTION state.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Client;
use super::states::Transaction;
use crate::command::Command;
use crate::response::{
    ScanListing, Stat, UniqueId, body_lines, parse_scan_listing, parse_stat, parse_unique_id,
};
use crate::{Error, Result};

impl<S> Client<S, Transaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the message count and total size of the maildrop.
    pub async fn stat(&mut self) -> Result<Stat> {
        let text = self.command(&Command::Stat).await?;
        let stat = parse_stat(&text)?;
        debug!(count = stat.count, size = stat.size, "STAT");
        Ok(stat)
    }

    /// Lists the size of every message.
    pub async fn list(&mut self) -> Result<Vec<ScanListing>> {
        let (_, body) = self.command_multiline(&Command::List(None)).await?;
        body_lines(&body)
            .iter()
            .map(|line| parse_scan_listing(line))
            .collect()
    }

    /// Returns the size of one message.
    pub async fn list_message(&mut self, message: u32) -> Result<ScanListing> {
        check_message_number(message)?;
        let text = self.command(&Command::List(Some(message))).await?;
        parse_scan_listing(&text)
    }

    /// Lists the unique id of every message.
    pub async fn uidl(&mut self) -> Result<Vec<UniqueId>> {
        let (_, body) = self.command_multiline(&Command::Uidl(None)).await?;
        body_lines(&body)
            .iter()
            .map(|line| parse_unique_id(line))
            .collect()
    }

    /// Returns the unique id of one message.
    pub async fn uidl_message(&mut self, message: u32) -> Result<UniqueId> {
        check_message_number(message)?;
        let text = self.command(&Command::Uidl(Some(message))).await?;
        parse_unique_id(&text)
    }

    /// Retrieves a full message (headers and body), dot-unstuffed.
    pub async fn retr(&mut self, message: u32) -> Result<Vec<u8>> {
        check_message_number(message)?;
        let (_, body) = self.command_multiline(&Command::Retr(message)).await?;
        debug!(message, bytes = body.len(), "RETR");
        Ok(body)
    }

    /// Retrieves the headers of a message plus the first `lines` body lines.
    pub async fn top(&mut self, message: u32, lines: u32) -> Result<Vec<u8>> {
        check_message_number(message)?;
        let (_, body) = self
            .command_multiline(&Command::Top { message, lines })
            .await?;
        Ok(body)
    }

    /// Does nothing; keeps the session alive.
    pub async fn noop(&mut self) -> Result<()> {
        self.command(&Command::Noop).await?;
        Ok(())
    }

    /// Unmarks any messages marked as deleted in this session.
    pub async fn rset(&mut self) -> Result<()> {
        self.command(&Command::Rset).await?;
        Ok(())
    }
}

fn check_message_number(message: u32) -> Result<()> {
    if message == 0 {
        return Err(Error::InvalidArgument(
            "POP3 message numbers start at 1".to_string(),
        ));
    }
    Ok(())
}
