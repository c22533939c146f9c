//! Interactive input of the number of messages.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::warn;

use crate::{Error, Result};

pub const PROMPT: &str = "number of messages to send: ";

/// Asks for the number of messages until a valid one is entered.
///
/// # Errors
/// [`Error::NoMessageCount`] if the input ends first.
pub async fn message_count<R, W>(input: R, output: &mut W) -> Result<u32>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            return Err(Error::NoMessageCount);
        };
        match line.trim().parse() {
            Ok(count) => return Ok(count),
            Err(err) => warn!(input = line.trim(), error = %err, "invalid number of messages"),
        }
    }
}
