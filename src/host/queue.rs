//! Scheduled builds waiting in the server queue

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::client::{JenkinsApi, JenkinsClient, JenkinsError, JenkinsResult, QueueItem};
use crate::polling::{RetryPolicy, poll_until};

use super::build::Build;
use super::wait_error;

/// A queue item created by scheduling a job
pub struct Queue<C: JenkinsApi = JenkinsClient> {
    job: String,
    number: u64,
    client: Arc<C>,
    policy: RetryPolicy,
}

impl<C: JenkinsApi> Clone for Queue<C> {
    fn clone(&self) -> Self {
        Self {
            job: self.job.clone(),
            number: self.number,
            client: Arc::clone(&self.client),
            policy: self.policy,
        }
    }
}

impl<C: JenkinsApi> fmt::Debug for Queue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("job", &self.job)
            .field("number", &self.number)
            .finish_non_exhaustive()
    }
}

impl<C: JenkinsApi> Queue<C> {
    pub(crate) fn new(job: &str, number: u64, client: Arc<C>, policy: RetryPolicy) -> Self {
        Self {
            job: job.to_string(),
            number,
            client,
            policy,
        }
    }

    /// Queue item number returned when the build was scheduled
    #[must_use]
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Fresh queue item document
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn info(&self) -> JenkinsResult<QueueItem> {
        self.client.get_queue_item(self.number).await
    }

    /// Queue id as reported by the server
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn id(&self) -> JenkinsResult<u64> {
        Ok(self.info().await?.id)
    }

    /// Stuck waiting for an executor
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn stuck(&self) -> JenkinsResult<bool> {
        Ok(self.info().await?.stuck)
    }

    /// Blocked by another build
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn blocked(&self) -> JenkinsResult<bool> {
        Ok(self.info().await?.blocked)
    }

    /// Ready to run as soon as an executor frees up
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn buildable(&self) -> JenkinsResult<bool> {
        Ok(self.info().await?.buildable)
    }

    /// Waits until the item leaves the queue and returns the started build.
    ///
    /// # Errors
    ///
    /// [`JenkinsError::Cancelled`] when the item is cancelled while waiting,
    /// [`JenkinsError::WaitTimeout`] when the wait policy deadline passes,
    /// otherwise the client error.
    pub async fn wait(&self) -> JenkinsResult<Build<C>> {
        debug!(job = %self.job, queue = self.number, "Waiting for queue item to start");
        let executable = poll_until(&self.policy, || async move {
            let item = self.info().await?;
            if item.cancelled == Some(true) {
                return Err(JenkinsError::Cancelled(self.number));
            }
            Ok(item.executable)
        })
        .await
        .map_err(|e| wait_error(e, format!("queue item {} to start", self.number)))?;

        Ok(Build::from_ref(
            &self.job,
            &executable,
            Arc::clone(&self.client),
            self.policy,
        ))
    }

    /// The build started from this item, waiting for it if necessary
    ///
    /// # Errors
    ///
    /// See [`wait`](Self::wait).
    pub async fn build(&self) -> JenkinsResult<Build<C>> {
        self.wait().await
    }

    /// Removes the item from the queue
    ///
    /// # Errors
    ///
    /// Propagates the client error.
    pub async fn cancel(&self) -> JenkinsResult<()> {
        let id = self.id().await?;
        self.client.cancel_queue(id).await
    }
}

impl<C: JenkinsApi> fmt::Display for Queue<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (queue item {})", self.job, self.number)
    }
}
