//! Course generation core.
//!
//! Everything needed to turn one decoded course outline into a finished
//! markdown document: the outline model, the variant classifier, the
//! composer, the text-generation seam and the orchestrator that drives it,
//! plus the artifact store the result is written to. Nothing here knows
//! about the message broker.

pub mod artifact;
pub mod classifier;
pub mod composer;
pub mod orchestrator;
pub mod outline;
pub mod prompts;
pub mod store;
pub mod text_generation;

use artifact::CourseArtifact;
use outline::ValidationError;
use orchestrator::GenerationFailure;

/// The result of handling a single inbound message.
///
/// Exactly one of these is produced per message. Only `Success` carries
/// anything to persist; the other two are logged and committed.
#[derive(Debug)]
pub enum ProcessingOutcome {
    /// The course was fully generated and assembled.
    Success(CourseArtifact),
    /// The message was not a usable outline.
    Skipped(ValidationError),
    /// Generation aborted; nothing may be written for this course.
    Failed(GenerationFailure),
}
