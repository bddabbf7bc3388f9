use std::fmt::Display;
use std::io;

use futures::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use futures::{Sink, SinkExt};

use super::frame::LogFrame;
use super::message::OutboundMessage;
use crate::runtime::{ContainerRuntime, LogStreamOptions};

/// Longest record accepted before the session is considered broken.
pub const MAX_RECORD_LEN: usize = 64 * 1024;

/// How a log session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    /// The runtime could not open the log stream.
    OpenFailed,
    /// The runtime closed the stream.
    StreamEnded { delivered: usize },
    /// Sending to the client failed.
    ClientGone { delivered: usize },
    /// Reading from the runtime failed mid-stream.
    ReadFailed { delivered: usize },
}

/// Open the log stream of `id` and forward it to `sink` until either side
/// stops.
pub async fn stream_container_logs<S>(
    runtime: &dyn ContainerRuntime,
    id: &str,
    sink: &mut S,
) -> BridgeOutcome
where
    S: Sink<OutboundMessage> + Unpin,
    S::Error: Display,
{
    let reader = match runtime
        .open_log_stream(id, LogStreamOptions::default())
        .await
    {
        Ok(reader) => reader,
        Err(e) => {
            log::warn!("Unable to open logs for {}: {}", id, e);
            let notice = OutboundMessage::error(format!("unable to fetch logs: {}", e));
            let _ = sink.send(notice).await;
            return BridgeOutcome::OpenFailed;
        }
    };
    run_bridge(reader, sink).await
}

/// Forward every record of `reader` to `sink`, in order, one message per
/// record.
///
/// The reader is owned by the bridge and dropped on every exit path.
pub async fn run_bridge<R, S>(mut reader: R, sink: &mut S) -> BridgeOutcome
where
    R: AsyncBufRead + Unpin,
    S: Sink<OutboundMessage> + Unpin,
    S::Error: Display,
{
    let mut delivered = 0;
    let mut record = Vec::with_capacity(256);

    loop {
        record.clear();
        match read_record(&mut reader, &mut record).await {
            Ok(true) => {}
            Ok(false) => return BridgeOutcome::StreamEnded { delivered },
            Err(e) => {
                log::warn!("Log stream read failed after {} messages: {}", delivered, e);
                let notice = OutboundMessage::error(format!("log stream interrupted: {}", e));
                let _ = sink.send(notice).await;
                return BridgeOutcome::ReadFailed { delivered };
            }
        }

        let Some(frame) = LogFrame::parse(&record) else {
            continue;
        };

        if let Err(e) = sink.send(OutboundMessage::from(frame)).await {
            log::debug!("Log client went away after {} messages: {}", delivered, e);
            return BridgeOutcome::ClientGone { delivered };
        }
        delivered += 1;
    }
}

/// Read one newline delimited record into `buf`, without its line ending.
///
/// Returns `Ok(false)` once the stream is exhausted.
async fn read_record<R>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let read = (&mut *reader)
        .take(MAX_RECORD_LEN as u64 + 1)
        .read_until(b'\n', buf)
        .await?;
    if read == 0 {
        return Ok(false);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > MAX_RECORD_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("log record longer than {} bytes", MAX_RECORD_LEN),
        ));
    }
    Ok(true)
}
