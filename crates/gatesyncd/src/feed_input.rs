//! Newline-delimited feed input.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use gatesync_core::FeedEvent;
use gatesync_listener::ListenerHandle;

/// Decode one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> anyhow::Result<Option<FeedEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

/// Apply every event read from `reader`, one at a time, until EOF.
///
/// Undecodable lines are logged and skipped; a failed event does not stop
/// the stream. Returns how many events were applied.
pub async fn pump<R>(reader: R, handle: &ListenerHandle) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut applied = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let event = match parse_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping undecodable feed line");
                continue;
            }
        };

        let kind = event.kind();
        let result = handle.apply(event).await?;
        applied += 1;
        match result.as_ref() {
            Ok(deployments) => {
                info!(line = line_no, kind, deployments = deployments.len(), "feed event applied")
            }
            Err(e) => warn!(line = line_no, kind, error = %e, "feed event rejected"),
        }
    }

    Ok(applied)
}
