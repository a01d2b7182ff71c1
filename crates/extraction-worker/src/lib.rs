//! VaultDrop Extraction Worker
//!
//! Consumes extraction jobs:
//! 1. Claims the document (`processing`)
//! 2. Downloads the raw PDF from the object store
//! 3. Extracts its text with lopdf
//! 4. Uploads the text artifact and marks the document `completed`
//!
//! Failures mark the document `failed` and hand the job back to the queue
//! for redelivery until the attempt budget is spent. The pool can run as its
//! own process or embedded in the gateway.

pub mod errors;
pub mod pdf;
pub mod processor;
pub mod runtime;

pub use errors::WorkerError;
pub use pdf::{LopdfExtractor, TextExtractor};
pub use processor::{ExtractionProcessor, HandleOutcome, JobHandler};
pub use runtime::{PoolSettings, WorkerPool};
