//! The in-memory deployment queue (spec §3 "Deployment", §1 Non-goals: "no
//! persistent queueing... in-memory with a best-effort metadata dump").

use indexmap::IndexMap;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentType {
    Local,
    IotJobs,
    Shadow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Queued,
    InProgress,
    Succeeded,
    Failed,
    Cancelled,
}

impl Stage {
    fn is_terminal(self) -> bool {
        matches!(self, Stage::Succeeded | Stage::Failed | Stage::Cancelled)
    }
}

#[derive(Debug, Clone)]
pub struct Deployment {
    pub id: String,
    pub deployment_type: DeploymentType,
    pub stage: Stage,
    pub is_cancelled: bool,
    pub recipe_dir: Option<String>,
    pub artifacts_dir: Option<String>,
}

impl Deployment {
    pub fn new(id: impl Into<String>, deployment_type: DeploymentType) -> Self {
        Self {
            id: id.into(),
            deployment_type,
            stage: Stage::Queued,
            is_cancelled: false,
            recipe_dir: None,
            artifacts_dir: None,
        }
    }
}

/// An insertion-ordered, unique-key deployment queue (spec §3: "pushes
/// with an existing id either replace... or are rejected").
#[derive(Default)]
pub struct DeploymentQueue {
    entries: Mutex<IndexMap<String, Deployment>>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Inserted,
    Replaced,
    RejectedInProgress,
}

impl DeploymentQueue {
    pub fn new() -> Self {
        Self { entries: Mutex::new(IndexMap::new()) }
    }

    /// A deployment with an id matching one already in the queue replaces
    /// it only if the existing entry has reached a terminal stage;
    /// otherwise the push is rejected so an in-flight deployment can't be
    /// silently clobbered out from under the worker processing it.
    pub fn push(&self, deployment: Deployment) -> PushOutcome {
        let mut entries = self.entries.lock();
        match entries.get(&deployment.id) {
            Some(existing) if !existing.stage.is_terminal() => PushOutcome::RejectedInProgress,
            Some(_) => {
                entries.insert(deployment.id.clone(), deployment);
                PushOutcome::Replaced
            }
            None => {
                entries.insert(deployment.id.clone(), deployment);
                PushOutcome::Inserted
            }
        }
    }

    /// Pops the oldest still-queued deployment, if any, marking it
    /// in-progress.
    pub fn pop_next(&self) -> Option<Deployment> {
        let mut entries = self.entries.lock();
        let next_id = entries
            .iter()
            .find(|(_, d)| d.stage == Stage::Queued && !d.is_cancelled)
            .map(|(id, _)| id.clone())?;
        let deployment = entries.get_mut(&next_id)?;
        deployment.stage = Stage::InProgress;
        Some(deployment.clone())
    }

    pub fn set_stage(&self, id: &str, stage: Stage) {
        if let Some(d) = self.entries.lock().get_mut(id) {
            d.stage = stage;
        }
    }

    pub fn cancel(&self, id: &str) {
        if let Some(d) = self.entries.lock().get_mut(id) {
            d.is_cancelled = true;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Best-effort metadata dump (ids, type, stage) for diagnostics across
    /// a restart; deliberately excludes recipe/artifact contents (spec
    /// Non-goals: metadata only, not a durable queue).
    pub fn dump_metadata(&self) -> Vec<(String, Stage)> {
        self.entries.lock().iter().map(|(id, d)| (id.clone(), d.stage)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacing_an_in_progress_deployment_is_rejected() {
        let queue = DeploymentQueue::new();
        queue.push(Deployment::new("d1", DeploymentType::Local));
        assert_eq!(queue.pop_next().unwrap().id, "d1");
        let outcome = queue.push(Deployment::new("d1", DeploymentType::Local));
        assert_eq!(outcome, PushOutcome::RejectedInProgress);
    }

    #[test]
    fn replacing_a_terminal_deployment_succeeds() {
        let queue = DeploymentQueue::new();
        queue.push(Deployment::new("d1", DeploymentType::Local));
        queue.set_stage("d1", Stage::Succeeded);
        let outcome = queue.push(Deployment::new("d1", DeploymentType::IotJobs));
        assert_eq!(outcome, PushOutcome::Replaced);
    }

    #[test]
    fn pop_next_skips_cancelled_entries() {
        let queue = DeploymentQueue::new();
        queue.push(Deployment::new("d1", DeploymentType::Local));
        queue.cancel("d1");
        queue.push(Deployment::new("d2", DeploymentType::Local));
        assert_eq!(queue.pop_next().unwrap().id, "d2");
    }
}
