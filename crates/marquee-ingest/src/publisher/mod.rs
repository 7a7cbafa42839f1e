//! Publisher: bounded-concurrency forwarding of accepted records
//!
//! At most `concurrency` publishes are in flight; they complete in any order.
//! The first failure (a sink error or an upstream pipeline error) is the
//! terminal result: the upstream stream is dropped right away, so nothing new
//! is pulled or dispatched, and publishes already in flight are awaited
//! before returning.

pub mod sink;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::{Stream, StreamExt};
use marquee_common::{IngestError, Result, ValidRecord};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::context::PipelineContext;

pub use sink::{JsonLinesSink, LogSink, PublishSink};

/// Outcome of a successful publish run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishSummary {
    pub published: u64,
}

/// Forwards records to a [`PublishSink`]
pub struct Publisher<S> {
    sink: Arc<S>,
    concurrency: usize,
    ctx: PipelineContext,
}

impl<S: PublishSink + 'static> Publisher<S> {
    pub fn new(sink: Arc<S>, concurrency: usize, ctx: PipelineContext) -> Self {
        Self {
            sink,
            concurrency: concurrency.max(1),
            ctx,
        }
    }

    /// Publish every record of `records`, failing on the first error
    pub async fn publish_all<St>(&self, records: St) -> Result<PublishSummary>
    where
        St: Stream<Item = Result<ValidRecord>>,
    {
        // `None` once the upstream is exhausted or released after a failure
        let mut upstream = Some(Box::pin(records));
        let mut in_flight = FuturesUnordered::new();
        let mut failure: Option<IngestError> = None;
        let mut summary = PublishSummary::default();

        loop {
            let can_pull = upstream.is_some() && in_flight.len() < self.concurrency;
            if !can_pull && in_flight.is_empty() {
                break;
            }

            tokio::select! {
                next = next_record(&mut upstream), if can_pull => match next {
                    None => upstream = None,
                    Some(Ok(record)) => {
                        info!(
                            id = record.id_str(),
                            title_type = record.title_type.as_deref().unwrap_or_default(),
                            genres = ?record.genres,
                            "Accepted record"
                        );
                        self.ctx.stats().add_accepted();
                        in_flight.push(self.publish_one(record));
                    },
                    Some(Err(e)) => {
                        error!(error = %e, in_flight = in_flight.len(), "Upstream failure, draining publishes");
                        release(&mut upstream);
                        failure = Some(e);
                    },
                },
                Some(outcome) = in_flight.next() => match outcome {
                    Ok(()) => {
                        summary.published += 1;
                        self.ctx.stats().add_published();
                    },
                    Err(e) => {
                        if failure.is_none() {
                            error!(error = %e, in_flight = in_flight.len(), "Publish failed, draining publishes");
                            release(&mut upstream);
                            failure = Some(e);
                        } else {
                            debug!(error = %e, "Further publish failure after the first");
                        }
                    },
                },
                else => break,
            }
        }

        match failure {
            Some(e) => Err(e),
            None => {
                debug!(published = summary.published, "All records published");
                Ok(summary)
            },
        }
    }

    fn publish_one(&self, record: ValidRecord) -> impl Future<Output = Result<()>> + Send + 'static {
        let sink = Arc::clone(&self.sink);
        async move {
            sink.publish(&record)
                .await
                .map_err(|e| IngestError::publish(record.id_str(), e))
        }
    }
}

async fn next_record<St: Stream>(upstream: &mut Option<Pin<Box<St>>>) -> Option<St::Item> {
    match upstream {
        Some(records) => records.next().await,
        None => None,
    }
}

/// Drop the upstream stream so its producers stop before in-flight publishes drain
fn release<St>(upstream: &mut Option<Pin<Box<St>>>) {
    if upstream.take().is_some() {
        debug!("Released record stream");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use marquee_common::PublishError;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    fn record(id: usize) -> ValidRecord {
        ValidRecord {
            id: Some(format!("tt{id}")),
            title_type: Some("movie".to_string()),
            primary_title: None,
            original_title: None,
            is_adult: None,
            start_year: None,
            end_year: None,
            runtime_minutes: None,
            genres: vec!["Comedy".to_string()],
        }
    }

    /// Sink tracking concurrency, optionally failing one id
    #[derive(Default)]
    struct TrackingSink {
        failing_id: Option<String>,
        current: AtomicUsize,
        peak: AtomicUsize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl PublishSink for TrackingSink {
        async fn publish(&self, record: &ValidRecord) -> std::result::Result<(), PublishError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            tokio::time::sleep(Duration::from_millis(5)).await;

            self.current.fetch_sub(1, Ordering::SeqCst);
            if self.failing_id.as_deref() == record.id.as_deref() {
                return Err(PublishError::rejected("broker unavailable"));
            }
            Ok(())
        }
    }

    fn records(count: usize) -> impl Stream<Item = Result<ValidRecord>> {
        stream::iter((0..count).map(|i| Ok(record(i))))
    }

    #[tokio::test]
    async fn test_all_publishes_succeed() {
        let ctx = PipelineContext::new();
        let sink = Arc::new(TrackingSink::default());
        let publisher = Publisher::new(Arc::clone(&sink), 4, ctx.clone());

        let summary = publisher.publish_all(records(20)).await.unwrap();

        assert_eq!(summary.published, 20);
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 20);
        assert_eq!(ctx.stats().snapshot().records_accepted, 20);
        assert_eq!(ctx.stats().snapshot().records_published, 20);
    }

    #[tokio::test]
    async fn test_in_flight_publishes_are_bounded() {
        let sink = Arc::new(TrackingSink::default());
        let publisher = Publisher::new(Arc::clone(&sink), 3, PipelineContext::new());

        publisher.publish_all(records(30)).await.unwrap();

        let peak = sink.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in flight was {peak}");
        assert!(peak >= 2);
    }

    #[tokio::test]
    async fn test_single_failure_fails_the_run() {
        let sink = Arc::new(TrackingSink {
            failing_id: Some("tt3".to_string()),
            ..Default::default()
        });
        let publisher = Publisher::new(Arc::clone(&sink), 2, PipelineContext::new());

        let err = publisher.publish_all(records(100)).await.unwrap_err();

        match err {
            IngestError::Publish { id, source } => {
                assert_eq!(id, "tt3");
                assert!(matches!(source, PublishError::Rejected(_)));
            },
            other => panic!("unexpected error: {other}"),
        }
        // Submission stops at the failure; only in-flight work drains
        assert!(sink.attempts.load(Ordering::SeqCst) < 100);
        assert_eq!(sink.current.load(Ordering::SeqCst), 0);
    }

    /// Sink rejecting `tt1` at once while `tt0` is still publishing
    struct SlowFirstSink {
        upstream_released: Arc<AtomicBool>,
        released_before_drain: AtomicBool,
    }

    #[async_trait]
    impl PublishSink for SlowFirstSink {
        async fn publish(&self, record: &ValidRecord) -> std::result::Result<(), PublishError> {
            match record.id_str() {
                "tt0" => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    let released = self.upstream_released.load(Ordering::SeqCst);
                    self.released_before_drain.store(released, Ordering::SeqCst);
                    Ok(())
                },
                "tt1" => Err(PublishError::rejected("down")),
                _ => Ok(()),
            }
        }
    }

    struct FlagOnDrop(Arc<AtomicBool>);

    impl Drop for FlagOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_failure_releases_upstream_before_draining() {
        let released = Arc::new(AtomicBool::new(false));
        let guard = FlagOnDrop(Arc::clone(&released));
        let upstream = records(100).map(move |r| {
            let _held = &guard;
            r
        });

        let sink = Arc::new(SlowFirstSink {
            upstream_released: Arc::clone(&released),
            released_before_drain: AtomicBool::new(false),
        });
        let publisher = Publisher::new(Arc::clone(&sink), 2, PipelineContext::new());

        let err = publisher.publish_all(upstream).await.unwrap_err();

        assert!(matches!(err, IngestError::Publish { ref id, .. } if id == "tt1"));
        // tt0 was still in flight when tt1 failed
        assert!(sink.released_before_drain.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_upstream_error_is_terminal() {
        let sink = Arc::new(TrackingSink::default());
        let publisher = Publisher::new(Arc::clone(&sink), 2, PipelineContext::new());

        let upstream = stream::iter(vec![
            Ok(record(1)),
            Err(IngestError::framing("/import/a.gz", 4, 1064)),
            Ok(record(2)),
        ]);
        let err = publisher.publish_all(upstream).await.unwrap_err();

        assert!(matches!(err, IngestError::Framing { line: 4, .. }));
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_stream_succeeds() {
        let publisher = Publisher::new(Arc::new(LogSink), 8, PipelineContext::new());
        let summary = publisher.publish_all(records(0)).await.unwrap();
        assert_eq!(summary.published, 0);
    }
}
