// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Serial session queue — every camera-session mutation runs here, one job at
// a time, in submission order.

use camkit_core::error::{CaptureError, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A FIFO of blocking jobs executed one after another.
///
/// A single tokio task drains the queue and runs each job on the blocking
/// pool, so device calls never stall the async executor and never overlap.
/// The task ends once every handle is dropped.
#[derive(Clone)]
pub struct SessionQueue {
    jobs: mpsc::UnboundedSender<Job>,
}

impl SessionQueue {
    /// Start the queue's drain task. Must be called inside a tokio runtime.
    pub fn spawn() -> Self {
        let (jobs, mut pending) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = pending.recv().await {
                if let Err(err) = tokio::task::spawn_blocking(job).await {
                    error!(error = %err, "session job panicked");
                }
            }
            debug!("session queue closed");
        });
        Self { jobs }
    }

    /// Run `work` after every previously submitted job and wait for its
    /// result.
    pub async fn run<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        let job: Job = Box::new(move || {
            // The caller may have stopped waiting.
            let _ = reply.send(work());
        });
        self.jobs
            .send(job)
            .map_err(|_| CaptureError::Bridge("session queue closed".into()))?;
        result
            .await
            .map_err(|_| CaptureError::Bridge("session job did not complete".into()))
    }

    /// Queue `work` without waiting for it.
    pub fn submit<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.jobs.send(Box::new(work)).is_err() {
            debug!("session queue closed; job dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn jobs_run_in_submission_order() {
        let queue = SessionQueue::spawn();
        let log = Arc::new(Mutex::new(Vec::new()));

        let slow = Arc::clone(&log);
        queue.submit(move || {
            std::thread::sleep(Duration::from_millis(30));
            slow.lock().unwrap().push("slow");
        });
        let fast = Arc::clone(&log);
        let value = queue
            .run(move || {
                fast.lock().unwrap().push("fast");
                7
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(*log.lock().unwrap(), vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn panicking_job_does_not_stop_the_queue() {
        let queue = SessionQueue::spawn();
        let failed = queue.run(|| -> u8 { panic!("device exploded") }).await;
        assert!(failed.is_err());

        let value = queue.run(|| 42).await.unwrap();
        assert_eq!(value, 42);
    }
}
