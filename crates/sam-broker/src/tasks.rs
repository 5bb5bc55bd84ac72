//! Fire-and-forget provisioning submission.
//!
//! Deploy/undeploy of a chatbot needs DNS and certificate work that a
//! broker must not wait for. Brokers push a [`ProvisioningTask`] onto an
//! unbounded channel and return; whoever owns the receiver hands the task to
//! the provisioner.

use chrono::{DateTime, Utc};
use sam_schemas::Kind;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{SamError, SamResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisioningAction {
    Deploy,
    Undeploy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningTask {
    pub id: Uuid,
    pub action: ProvisioningAction,
    pub account: String,
    pub kind: Kind,
    pub name: String,
    /// Hostnames that should (or should no longer) resolve to the chatbot.
    pub hosts: Vec<String>,
    pub submitted: DateTime<Utc>,
}

impl ProvisioningTask {
    pub fn new(
        action: ProvisioningAction,
        account: impl Into<String>,
        kind: Kind,
        name: impl Into<String>,
        hosts: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            account: account.into(),
            kind,
            name: name.into(),
            hosts,
            submitted: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReceipt {
    pub task_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct TaskSubmitter {
    tx: mpsc::UnboundedSender<ProvisioningTask>,
}

impl TaskSubmitter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProvisioningTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A submitter whose receiver is already gone; every submit fails.
    pub fn disconnected() -> Self {
        let (submitter, rx) = Self::channel();
        drop(rx);
        submitter
    }

    /// Brokers check this before mutating so a deploy never half-happens.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn submit(&self, task: ProvisioningTask) -> SamResult<TaskReceipt> {
        let receipt = TaskReceipt { task_id: task.id };
        let (action, name) = (task.action, task.name.clone());
        self.tx
            .send(task)
            .map_err(|_| SamError::NotReady("provisioning queue is not accepting tasks".into()))?;
        tracing::info!(task_id = %receipt.task_id, ?action, %name, "provisioning task submitted");
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submitted_tasks_reach_the_receiver() {
        let (submitter, mut rx) = TaskSubmitter::channel();
        let task = ProvisioningTask::new(
            ProvisioningAction::Deploy,
            "acme",
            Kind::Chatbot,
            "support",
            vec!["support.smarter.sh".into()],
        );
        let receipt = submitter.submit(task.clone()).unwrap();
        assert_eq!(receipt.task_id, task.id);
        assert_eq!(rx.recv().await, Some(task));
    }

    #[test]
    fn closed_queue_is_not_ready() {
        let submitter = TaskSubmitter::disconnected();
        assert!(submitter.is_closed());
        let err = submitter
            .submit(ProvisioningTask::new(
                ProvisioningAction::Undeploy,
                "acme",
                Kind::Chatbot,
                "support",
                vec![],
            ))
            .unwrap_err();
        assert_eq!(err.class(), "NotReady");
    }
}
