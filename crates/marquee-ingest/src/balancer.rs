//! Balancer: demand-driven file dispatch over a fixed pool of lanes
//!
//! Each lane worker pulls the next file from a shared source only when it has
//! finished its previous file and pushed every record into the shared output
//! channel. The source sits behind a FIFO-fair async mutex, so idle lanes are
//! served in the order they asked. All lanes fan into one bounded channel
//! without any global ordering.
//!
//! A fatal error from the source or a lane cancels every lane and is
//! forwarded downstream. Dropping the output stream cancels the lanes too.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use marquee_common::{IngestError, InputFile, Record, Result};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, Instrument};

use crate::context::PipelineContext;
use crate::lane::Lane;

type FileSource = Arc<Mutex<BoxStream<'static, Result<InputFile>>>>;
type RecordSender = mpsc::Sender<Result<Record>>;

/// Dispatches files to `lanes` concurrent workers sharing one [`Lane`]
pub struct Balancer<L: Lane> {
    lane: Arc<L>,
    lanes: usize,
    output_buffer: usize,
    ctx: PipelineContext,
}

impl<L: Lane> Balancer<L> {
    pub fn new(lane: L, lanes: usize, output_buffer: usize, ctx: PipelineContext) -> Self {
        Self {
            lane: Arc::new(lane),
            lanes: lanes.max(1),
            output_buffer: output_buffer.max(1),
            ctx,
        }
    }

    /// Start the lane workers over `files` and return the merged record stream
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run<S>(&self, files: S) -> BalancedStream
    where
        S: Stream<Item = Result<InputFile>> + Send + 'static,
    {
        let source: FileSource = Arc::new(Mutex::new(files.boxed()));
        let (output, records) = mpsc::channel(self.output_buffer);
        let cancel = CancellationToken::new();

        let mut workers = JoinSet::new();
        for index in 0..self.lanes {
            let worker = LaneWorker {
                index,
                lane: Arc::clone(&self.lane),
                source: Arc::clone(&source),
                output: output.clone(),
                cancel: cancel.clone(),
            };
            workers.spawn(worker.run().instrument(self.ctx.lane_span(index)));
        }

        debug!(lanes = self.lanes, output_buffer = self.output_buffer, "Balancer started");

        tokio::spawn(supervise(workers, output, cancel.clone()).instrument(self.ctx.span().clone()));

        BalancedStream {
            records: ReceiverStream::new(records),
            _cancel_on_drop: cancel.drop_guard(),
        }
    }
}

/// Merged output of every lane
///
/// Ends once the file source is exhausted and every lane has finished.
/// Dropping it cancels all lanes.
pub struct BalancedStream {
    records: ReceiverStream<Result<Record>>,
    _cancel_on_drop: DropGuard,
}

impl Stream for BalancedStream {
    type Item = Result<Record>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.records.poll_next_unpin(cx)
    }
}

/// How a lane finished with one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileOutcome {
    Completed,
    Failed,
    Stopped,
}

struct LaneWorker<L> {
    index: usize,
    lane: Arc<L>,
    source: FileSource,
    output: RecordSender,
    cancel: CancellationToken,
}

impl<L: Lane> LaneWorker<L> {
    async fn run(self) {
        let mut files = 0usize;

        loop {
            let Some(next) = self.next_file().await else {
                break;
            };

            let file = match next {
                Ok(file) => file,
                Err(e) => {
                    error!(error = %e, "File source failed");
                    self.fail(e).await;
                    break;
                },
            };

            // Another lane may have failed while this one waited for the source
            if self.cancel.is_cancelled() {
                debug!(file = %file.name(), "Cancelled before opening file");
                break;
            }

            files += 1;
            if self.drain_file(file).await != FileOutcome::Completed {
                break;
            }
        }

        debug!(lane = self.index, files, "Lane finished");
    }

    /// Wait for the next file; `None` when the source is exhausted or the run is cancelled
    async fn next_file(&self) -> Option<Result<InputFile>> {
        let mut source = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            source = self.source.lock() => source,
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            next = source.next() => next,
        }
    }

    async fn drain_file(&self, file: InputFile) -> FileOutcome {
        let name = file.name().into_owned();
        debug!(file = %name, size_bytes = file.size_bytes, "Processing file");

        let mut records = self.lane.process(file);
        let mut count = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(file = %name, records = count, "Lane cancelled");
                    return FileOutcome::Stopped;
                },
                next = records.next() => next,
            };

            match next {
                None => break,
                Some(Ok(record)) => {
                    count += 1;
                    if !self.forward(record).await {
                        return FileOutcome::Stopped;
                    }
                },
                Some(Err(e)) => {
                    error!(file = %name, error = %e, "Lane failed");
                    self.fail(e).await;
                    return FileOutcome::Failed;
                },
            }
        }

        info!(file = %name, records = count, "Finished file");
        FileOutcome::Completed
    }

    /// Push a record downstream; `false` once the run is cancelled or the receiver is gone
    async fn forward(&self, record: Record) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.output.send(Ok(record)) => sent.is_ok(),
        }
    }

    async fn fail(&self, error: IngestError) {
        fail(&self.output, &self.cancel, error).await;
    }
}

/// Cancel every lane, then forward `error` downstream
async fn fail(output: &RecordSender, cancel: &CancellationToken, error: IngestError) {
    cancel.cancel();
    // A closed receiver means downstream already stopped listening
    let _ = output.send(Err(error)).await;
}

/// Turn a panicked or aborted lane worker into a fatal error
async fn supervise(mut workers: JoinSet<()>, output: RecordSender, cancel: CancellationToken) {
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "Lane worker task failed");
            fail(&output, &cancel, IngestError::task(format!("lane worker failed: {}", e))).await;
        }
    }
    debug!("All lanes finished");
}
