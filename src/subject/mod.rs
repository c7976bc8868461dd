//! Subject jobs: aggregation of batch detection jobs under one tracked,
//! cancellable, reported-on unit of work.

pub mod callback;
pub mod manager;
pub mod output;
pub mod request;
pub mod views;

pub use callback::{
    CallbackSender, STATUS_COMPLETE, STATUS_ERROR_PREFIX, STATUS_IN_PROGRESS, STATUS_NOT_REQUESTED,
};
pub use manager::SubjectJobManager;
pub use output::SubjectOutput;
pub use request::{CallbackMethod, SubjectJobRequest};
pub use views::{SubjectJobReport, SubjectJobStatus, SubjectJobSummary};
