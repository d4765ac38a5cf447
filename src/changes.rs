//! Change-task validation, runs and activity polling.

use crate::client::PrismClient;
use crate::error::{PrismError, Result};
use crate::lister::{DataChanges, DetailLevel, ResourceQuery};
use crate::model::{Activity, ChangeTask};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of an action the service can refuse with a structured error.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome<T> {
    Accepted(T),
    /// The service's error body, returned as a value rather than raised.
    Rejected(Value),
}

impl<T> ActionOutcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ActionOutcome::Accepted(_))
    }

    pub fn accepted(self) -> Option<T> {
        match self {
            ActionOutcome::Accepted(value) => Some(value),
            ActionOutcome::Rejected(_) => None,
        }
    }
}

/// Bounded exponential backoff for [`ChangeTasks::wait_for_activity`].
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Wait before the second status fetch.
    pub initial_delay: Duration,
    /// Ceiling for any single wait.
    pub max_delay: Duration,
    /// Growth factor between waits; values below 1.0 are treated as 1.0.
    pub multiplier: f64,
    /// Total time allowed before giving up.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl PollPolicy {
    fn next_delay(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier.max(1.0)).min(self.max_delay)
    }
}

pub struct ChangeTasks<'a> {
    client: &'a PrismClient,
}

impl<'a> ChangeTasks<'a> {
    pub fn new(client: &'a PrismClient) -> Self {
        Self { client }
    }

    fn url(&self, operation: &str) -> String {
        format!("{}/dataChanges{}", self.client.endpoints().prism, operation)
    }

    /// Asks the service to validate a change task. `None` when no usable
    /// answer came back.
    pub async fn validate(&self, change_id: &str) -> Option<ActionOutcome<Value>> {
        let url = self.url(&format!("/{change_id}/validate"));
        let response = self.client.gateway().get(&url).await;
        match response.status {
            200 => response.json().map(ActionOutcome::Accepted),
            400 | 404 => response.json().map(ActionOutcome::Rejected),
            _ => None,
        }
    }

    /// True only for an accepted validation whose body has no `error`.
    pub async fn is_valid(&self, change_id: &str) -> bool {
        match self.validate(change_id).await {
            Some(ActionOutcome::Accepted(body)) => body.get("error").is_none(),
            _ => false,
        }
    }

    /// Starts an activity, optionally over the files of a file container.
    pub async fn run(
        &self,
        change_id: &str,
        container_id: Option<&str>,
    ) -> Option<ActionOutcome<Activity>> {
        let url = self.url(&format!("/{change_id}/activities"));
        let gateway = self.client.gateway();
        let response = match container_id {
            Some(id) => gateway.post_json(&url, json!({ "fileContainerWid": id })).await,
            None => gateway.post(&url).await,
        };
        match response.status {
            201 => {
                let activity: Activity = response.json()?;
                info!(change_id, activity_id = %activity.id, "started change task activity");
                Some(ActionOutcome::Accepted(activity))
            }
            400 => response.json().map(ActionOutcome::Rejected),
            _ => None,
        }
    }

    pub async fn activity(&self, change_id: &str, activity_id: &str) -> Option<Activity> {
        let url = self.url(&format!("/{change_id}/activities/{activity_id}"));
        let response = self.client.gateway().get(&url).await;
        if response.status == 200 {
            response.json()
        } else {
            None
        }
    }

    /// Polls an activity until it reaches a terminal state.
    ///
    /// A failed fetch is logged and polling continues; only the policy's
    /// timeout or `cancel` ends the wait early.
    pub async fn wait_for_activity(
        &self,
        change_id: &str,
        activity_id: &str,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<Activity> {
        let started = Instant::now();
        let deadline = started + policy.timeout;
        let mut delay = policy.initial_delay;

        loop {
            if cancel.is_cancelled() {
                return Err(PrismError::Cancelled {
                    activity_id: activity_id.to_string(),
                });
            }

            match self.activity(change_id, activity_id).await {
                Some(activity) => {
                    let state = activity.state();
                    if state.is_terminal() {
                        info!(change_id, activity_id, state = ?state, "activity finished");
                        return Ok(activity);
                    }
                    debug!(change_id, activity_id, state = ?state, "activity still running");
                }
                None => warn!(change_id, activity_id, "could not fetch activity, will retry"),
            }

            let now = Instant::now();
            if now >= deadline {
                error!(change_id, activity_id, "gave up waiting for activity");
                return Err(PrismError::PollTimeout {
                    activity_id: activity_id.to_string(),
                    waited_secs: (now - started).as_secs(),
                });
            }

            let pause = delay.min(deadline - now);
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(change_id, activity_id, "wait for activity cancelled");
                    return Err(PrismError::Cancelled {
                        activity_id: activity_id.to_string(),
                    });
                }
                _ = tokio::time::sleep(pause) => {}
            }
            delay = policy.next_delay(delay);
        }
    }

    /// Finds the task by exact name, validates it, runs it and waits for the
    /// activity to finish.
    pub async fn execute(
        &self,
        name: &str,
        container_id: Option<&str>,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<Activity> {
        let query = ResourceQuery::by_name(name).detail(DetailLevel::Full);
        let tasks = self
            .client
            .resources()
            .list::<DataChanges>(&query)
            .await
            .into_collection();
        let task: ChangeTask = match tasks.total() {
            1 => tasks
                .into_iter()
                .next()
                .ok_or_else(|| PrismError::Other(format!("change task {name} not found")))?,
            0 => return Err(PrismError::Other(format!("change task {name} not found"))),
            n => {
                return Err(PrismError::Other(format!(
                    "change task name {name} matched {n} tasks"
                )))
            }
        };

        if !self.is_valid(&task.id).await {
            return Err(PrismError::Other(format!(
                "change task {name} failed validation"
            )));
        }

        match self.run(&task.id, container_id).await {
            Some(ActionOutcome::Accepted(activity)) => {
                self.wait_for_activity(&task.id, &activity.id, policy, cancel)
                    .await
            }
            Some(ActionOutcome::Rejected(body)) => Err(PrismError::Other(format!(
                "change task {name} was rejected: {body}"
            ))),
            None => Err(PrismError::Other(format!(
                "change task {name} could not be started"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_capped() {
        let policy = PollPolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            multiplier: 3.0,
            timeout: Duration::from_secs(60),
        };
        let second = policy.next_delay(policy.initial_delay);
        assert_eq!(second, Duration::from_secs(3));
        assert_eq!(policy.next_delay(second), Duration::from_secs(5));
    }

    #[test]
    fn multiplier_below_one_never_shrinks_delay() {
        let policy = PollPolicy {
            multiplier: 0.5,
            ..PollPolicy::default()
        };
        assert_eq!(
            policy.next_delay(Duration::from_secs(4)),
            Duration::from_secs(4)
        );
    }
}
