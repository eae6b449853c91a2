use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::writer_jsonl::{render_error, render_result, OutputFormat, ScanEvent};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub results: usize,
    pub errors: usize,
}

/// Drain `rx`, writing results to `out` and errors to `err`, one line each.
/// The only writer of both streams, so lines never interleave.
pub async fn drain_events<W, E>(mut rx: mpsc::Receiver<ScanEvent>, out: &mut W, err: &mut E, format: OutputFormat) -> WriterStats
where
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    let mut stats = WriterStats::default();
    while let Some(ev) = rx.recv().await {
        match &ev {
            ScanEvent::Result(r) => {
                stats.results += 1;
                write_line(out, &render_result(r, format)).await;
            }
            ScanEvent::Error(e) => {
                stats.errors += 1;
                write_line(err, &render_error(e)).await;
            }
        }
    }
    // flush on close
    if let Err(e) = out.flush().await {
        tracing::error!(error=%e, "failed to flush result stream");
    }
    if let Err(e) = err.flush().await {
        tracing::error!(error=%e, "failed to flush error stream");
    }
    stats
}

async fn write_line<W: AsyncWrite + Unpin>(w: &mut W, line: &str) {
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
    if let Err(e) = w.write_all(&buf).await {
        tracing::error!(error=%e, "failed to write output line");
    }
}

/// Spawn the task that owns stdout and stderr for the duration of a scan.
pub fn spawn_output_writer(rx: mpsc::Receiver<ScanEvent>, format: OutputFormat) -> tokio::task::JoinHandle<WriterStats> {
    tokio::spawn(async move {
        let mut out = tokio::io::stdout();
        let mut err = tokio::io::stderr();
        drain_events(rx, &mut out, &mut err, format).await
    })
}
