//! Resilient task submission.

use crate::report::ConsoleReporter;
use crate::retry::RetryPolicy;
use crate::watcher::TaskWatchers;
use dispatch_core::{
    EmergencyTask, EmergencyType, FaultInjector, Queue, SubmitError, Synthesizer, TaskHandle,
    TaskSource,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of one `submit_one` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The queue accepted the task and a watcher was started for it
    Submitted { task_id: TaskHandle, attempts: u32 },
    /// Every attempt failed; the task is dropped
    Exhausted { attempts: u32, last_error: SubmitError },
}

impl SubmitOutcome {
    pub fn task_id(&self) -> Option<&TaskHandle> {
        match self {
            SubmitOutcome::Submitted { task_id, .. } => Some(task_id),
            SubmitOutcome::Exhausted { .. } => None,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            SubmitOutcome::Submitted { attempts, .. } | SubmitOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Synthesizes a task and pushes it to the queue with bounded retries.
///
/// Injected faults and queue errors are treated the same way: both are
/// retried after an exponential backoff until the policy runs out of
/// attempts.
pub struct Submitter {
    queue: Arc<dyn Queue>,
    source: Box<dyn TaskSource>,
    faults: FaultInjector,
    policy: RetryPolicy,
    watchers: TaskWatchers,
    reporter: ConsoleReporter,
}

impl Submitter {
    pub fn new(queue: Arc<dyn Queue>, watchers: TaskWatchers, reporter: ConsoleReporter) -> Self {
        Submitter {
            queue,
            source: Box::new(Synthesizer::new()),
            faults: FaultInjector::default(),
            policy: RetryPolicy::default(),
            watchers,
            reporter,
        }
    }

    pub fn with_source(mut self, source: impl TaskSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn with_faults(mut self, faults: FaultInjector) -> Self {
        self.faults = faults;
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn watchers(&self) -> &TaskWatchers {
        &self.watchers
    }

    /// Submit one freshly synthesized task.
    ///
    /// Never returns an error: exhaustion is reported and handed back as
    /// [`SubmitOutcome::Exhausted`] so the caller can simply move on.
    pub async fn submit_one(&mut self) -> SubmitOutcome {
        let task = self.source.next_task();
        let task_type = task.emergency_type();
        let mut attempt = 1;

        loop {
            match self.attempt(task_type, &task).await {
                Ok(task_id) => {
                    info!(task_id = %task_id, task_type = %task_type, attempt, "Task submitted");
                    self.reporter.submitted(&task_id);
                    self.watchers.spawn(task_id.clone());

                    return SubmitOutcome::Submitted {
                        task_id,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    warn!(task_type = %task_type, attempt, "Submission attempt failed: {}", e);
                    self.reporter.submit_failed(&e);

                    if !self.policy.should_retry(attempt) {
                        error!(
                            task_type = %task_type,
                            "Giving up after {} attempts", attempt
                        );
                        self.reporter.exhausted(self.policy.max_attempts);

                        return SubmitOutcome::Exhausted {
                            attempts: attempt,
                            last_error: e,
                        };
                    }

                    self.reporter.retrying(attempt, self.policy.max_attempts);
                    tokio::time::sleep(self.policy.delay_after(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        &mut self,
        task_type: EmergencyType,
        task: &EmergencyTask,
    ) -> Result<TaskHandle, SubmitError> {
        self.faults.maybe_fail()?;
        let task_id = self.queue.send(task_type, task).await?;
        Ok(task_id)
    }
}
