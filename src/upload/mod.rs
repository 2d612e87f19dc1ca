//! File upload pipeline: per-file sessions and the batch controller.

mod collection;
mod session;

pub use collection::{AttachmentVerdict, UploadCollection};
pub use session::{validate, Rejection, SubmitOutcome, SubmitResult, UploadSession, UploadStatus};
