use thiserror::Error;

use crate::JobId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Job {0} is not in the queue")]
    JobNotFound(JobId),
}
