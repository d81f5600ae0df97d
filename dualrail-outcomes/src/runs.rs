//! Minimal workflow-run lookup the settlement query depends on
//! (`WorkflowRun.started_at` gates condition (c) of `settled_outcomes`).
//! Workflow-run lifecycle management itself lives outside this crate.

use std::collections::HashMap;

use async_trait::async_trait;
use dualrail_core::model::WorkflowRun;
use parking_lot::RwLock;
use uuid::Uuid;

#[async_trait]
pub trait WorkflowRunDirectory: Send + Sync {
    async fn get(&self, run_id: Uuid) -> Option<WorkflowRun>;
}

#[derive(Default)]
pub struct InMemoryWorkflowRunDirectory {
    runs: RwLock<HashMap<Uuid, WorkflowRun>>,
}

impl InMemoryWorkflowRunDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, run: WorkflowRun) {
        self.runs.write().insert(run.id, run);
    }
}

#[async_trait]
impl WorkflowRunDirectory for InMemoryWorkflowRunDirectory {
    async fn get(&self, run_id: Uuid) -> Option<WorkflowRun> {
        self.runs.read().get(&run_id).cloned()
    }
}

/// Any of the pipeline's canonical workflow-run stores doubles as a
/// directory for settlement lookups, so the verifier can be wired against
/// the same store the scheduler and COGS calculator use.
#[async_trait]
impl<T: dualrail_store::WorkflowRunStore> WorkflowRunDirectory for T {
    async fn get(&self, run_id: Uuid) -> Option<WorkflowRun> {
        dualrail_store::WorkflowRunStore::get(self, run_id).await
    }
}
