//! JSON-lines event sources.
//!
//! One event per line. Blank lines are skipped; a line that does not parse
//! is logged and skipped so one bad record never stalls the stream.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use chatline_shared::protocol::InboundEvent;

use crate::config::SourceSpec;
use crate::error::ServerError;

/// Counters reported when a source ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SourceStats {
    pub lines: u64,
    pub events: u64,
    pub malformed: u64,
}

/// Open `spec` and forward its events into `tx` on a background task.
pub fn spawn_reader(
    spec: SourceSpec,
    tx: mpsc::Sender<InboundEvent>,
) -> JoinHandle<Result<SourceStats, ServerError>> {
    tokio::spawn(async move {
        let name = spec.name();
        let stats = match &spec {
            SourceSpec::Stdin => pump(&name, BufReader::new(tokio::io::stdin()), tx).await?,
            SourceSpec::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .map_err(|source| ServerError::SourceOpen {
                        path: path.clone(),
                        source,
                    })?;
                pump(&name, BufReader::new(file), tx).await?
            }
        };
        info!(
            source = %name,
            events = stats.events,
            malformed = stats.malformed,
            "Event source drained"
        );
        Ok(stats)
    })
}

/// Read lines until EOF or until the receiving pipeline goes away.
pub async fn pump<R>(
    name: &str,
    reader: R,
    tx: mpsc::Sender<InboundEvent>,
) -> Result<SourceStats, ServerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = SourceStats::default();
    let mut lines = reader.lines();

    loop {
        let line = lines
            .next_line()
            .await
            .map_err(|source| ServerError::SourceRead {
                name: name.to_string(),
                source,
            })?;
        let Some(line) = line else { break };

        stats.lines += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<InboundEvent>(trimmed) {
            Ok(event) => {
                if tx.send(event).await.is_err() {
                    warn!(source = %name, "Pipeline closed, stopping source");
                    break;
                }
                stats.events += 1;
            }
            Err(e) => {
                stats.malformed += 1;
                warn!(source = %name, line = stats.lines, error = %e, "Skipping malformed event");
            }
        }
    }

    Ok(stats)
}
