//! The consumer loop.
//!
//! One message at a time: fetch, decode, generate, persist, commit. The
//! offset is committed only after the message has been fully handled, so a
//! crash anywhere before the commit means redelivery rather than loss.
//! Invalid messages and failed generations are still committed; they are
//! logged and dropped.

use crate::broker::{InboundMessage, MessageSource};
use coursegen_core::{
    ProcessingOutcome,
    orchestrator::Orchestrator,
    outline::{CourseOutline, ValidationError},
    store::{ArtifactStore, PersistenceError, artifact_file_name},
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// What to do with the offset when a generated course cannot be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistFailurePolicy {
    /// Log and commit anyway; the course is lost.
    Commit,
    /// Stop the loop without committing so the message is redelivered.
    Halt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Idle,
    Fetching,
    Processing,
    Committing,
    Stopped,
}

/// Counters accumulated over the life of the loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub received: u64,
    pub succeeded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub persist_failures: u64,
    pub commit_failures: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("artifact for course '{course}' could not be persisted: {source}")]
    PersistenceHalt {
        course: String,
        #[source]
        source: PersistenceError,
    },
}

const DEFAULT_FETCH_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct CourseConsumer<S> {
    source: S,
    orchestrator: Orchestrator,
    store: Arc<dyn ArtifactStore>,
    on_persist_failure: PersistFailurePolicy,
    fetch_retry_delay: Duration,
    state: ConsumerState,
    stats: LoopStats,
}

impl<S: MessageSource> CourseConsumer<S> {
    pub fn new(
        source: S,
        orchestrator: Orchestrator,
        store: Arc<dyn ArtifactStore>,
        on_persist_failure: PersistFailurePolicy,
    ) -> Self {
        Self {
            source,
            orchestrator,
            store,
            on_persist_failure,
            fetch_retry_delay: DEFAULT_FETCH_RETRY_DELAY,
            state: ConsumerState::Idle,
            stats: LoopStats::default(),
        }
    }

    /// Pause after a failed fetch before asking the broker again.
    pub fn with_fetch_retry_delay(mut self, delay: Duration) -> Self {
        self.fetch_retry_delay = delay;
        self
    }

    pub fn state(&self) -> ConsumerState {
        self.state
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Processes messages until `shutdown` resolves.
    ///
    /// The stop signal is only observed while waiting for a message; a
    /// message already in flight is always carried through to its commit.
    /// Returns an error only under `PersistFailurePolicy::Halt`.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<LoopStats, LoopError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            self.state = ConsumerState::Fetching;
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                next = self.source.next_message() => next,
            };

            let message = match next {
                Ok(message) => message,
                Err(e) => {
                    error!(error = %e, "Failed to fetch message");
                    self.state = ConsumerState::Idle;
                    let stop = tokio::select! {
                        biased;
                        _ = &mut shutdown => true,
                        _ = tokio::time::sleep(self.fetch_retry_delay) => false,
                    };
                    if stop {
                        break;
                    }
                    continue;
                }
            };

            self.stats.received += 1;
            let span = info_span!(
                "message",
                partition = message.partition,
                offset = message.offset
            );
            if let Err(e) = self.handle(&message).instrument(span).await {
                self.state = ConsumerState::Stopped;
                return Err(e);
            }
            self.state = ConsumerState::Idle;
        }

        info!(stats = ?self.stats, "Stop signal received; consumer loop stopped");
        self.state = ConsumerState::Stopped;
        Ok(self.stats.clone())
    }

    /// Runs one message through processing, persistence and commit.
    async fn handle(&mut self, message: &InboundMessage) -> Result<(), LoopError> {
        self.state = ConsumerState::Processing;
        let outcome = self.process(message).await;
        self.settle(outcome).await?;

        self.state = ConsumerState::Committing;
        match self.source.commit(message).await {
            Ok(()) => debug!("Offset committed"),
            Err(e) => {
                // A later commit on this partition covers it; redelivered only if we exit first.
                self.stats.commit_failures += 1;
                error!(error = %e, "Failed to commit offset");
            }
        }
        Ok(())
    }

    /// Decodes the payload and generates the course. Never persists.
    pub async fn process(&self, message: &InboundMessage) -> ProcessingOutcome {
        let decoded = match message.payload.as_deref() {
            Some(payload) => CourseOutline::from_payload(payload),
            None => Err(ValidationError::EmptyPayload),
        };
        let outline = match decoded {
            Ok(outline) => outline,
            Err(e) => {
                warn!(error = %e, "Invalid message format; skipping");
                return ProcessingOutcome::Skipped(e);
            }
        };

        info!(course = %outline.title, modules = outline.modules.len(), "Received course outline");
        match self.orchestrator.generate(&outline).await {
            Ok(artifact) => ProcessingOutcome::Success(artifact),
            Err(failure) => {
                error!(course = %outline.title, error = %failure, "Course generation failed; dropping course");
                ProcessingOutcome::Failed(failure)
            }
        }
    }

    async fn settle(&mut self, outcome: ProcessingOutcome) -> Result<(), LoopError> {
        let artifact = match outcome {
            ProcessingOutcome::Success(artifact) => artifact,
            ProcessingOutcome::Skipped(_) => {
                self.stats.skipped += 1;
                return Ok(());
            }
            ProcessingOutcome::Failed(_) => {
                self.stats.failed += 1;
                return Ok(());
            }
        };

        let name = artifact_file_name(&artifact.title);
        match self.store.persist(&name, &artifact.to_markdown()).await {
            Ok(path) => {
                self.stats.succeeded += 1;
                info!(course = %artifact.title, path = %path.display(), "Course content saved");
                Ok(())
            }
            Err(source) => {
                self.stats.persist_failures += 1;
                error!(course = %artifact.title, error = %source, policy = ?self.on_persist_failure, "Failed to save course content");
                match self.on_persist_failure {
                    PersistFailurePolicy::Commit => Ok(()),
                    PersistFailurePolicy::Halt => Err(LoopError::PersistenceHalt {
                        course: artifact.title,
                        source,
                    }),
                }
            }
        }
    }
}
