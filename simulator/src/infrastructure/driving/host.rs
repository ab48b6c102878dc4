use serde::Serialize;
use shared::HostMessage;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::domain::value_objects::SessionStatus;

/// Forward one JSON host message per line from `reader` into `tx`.
///
/// Blank and unparseable lines are skipped. Returns the number of messages
/// forwarded once the input ends or the receiver goes away.
pub async fn pump_host_messages<R>(reader: R, tx: mpsc::Sender<HostMessage>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let message = match HostMessage::parse(line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, line, "ignoring malformed host message");
                continue;
            }
        };
        debug!(message = ?message, "host message");
        if tx.send(message).await.is_err() {
            debug!("host receiver closed");
            break;
        }
        forwarded += 1;
    }

    info!(forwarded, "host input closed");
    Ok(forwarded)
}

#[derive(Serialize)]
struct StatusLine<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    status: &'a SessionStatus,
}

/// Write the current status, then every change, as JSON lines until the controller is dropped
pub async fn report_status<W>(mut rx: watch::Receiver<SessionStatus>, mut out: W) -> std::io::Result<W>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let status = rx.borrow_and_update().clone();
        let mut line = serde_json::to_string(&StatusLine {
            kind: "STATUS",
            status: &status,
        })?;
        line.push('\n');
        out.write_all(line.as_bytes()).await?;
        out.flush().await?;

        if rx.changed().await.is_err() {
            return Ok(out);
        }
    }
}
