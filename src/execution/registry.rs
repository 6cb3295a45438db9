use super::{Execution, ExecutionError, ExecutionId, StatusChangeOutcome, StepId};
use crate::status::Status;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Shared set of live executions.
///
/// Each execution sits behind its own lock: changes to one execution run one
/// at a time from read to write, changes to different executions do not wait
/// on each other.
#[derive(Clone, Default)]
pub struct ExecutionRegistry {
    executions: Arc<RwLock<HashMap<ExecutionId, Arc<Mutex<Execution>>>>>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an execution, replacing any previous one with the same id.
    pub async fn insert(&self, execution: Execution) -> ExecutionId {
        let id = execution.id();
        self.executions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(execution)));
        debug!(execution = %id, "execution registered");
        id
    }

    pub async fn remove(&self, id: ExecutionId) -> Option<Execution> {
        let entry = self.executions.write().await.remove(&id)?;
        // A change still running on another handle keeps the entry shared.
        match Arc::try_unwrap(entry) {
            Ok(execution) => Some(execution.into_inner()),
            Err(shared) => Some(shared.lock().await.clone()),
        }
    }

    pub async fn len(&self) -> usize {
        self.executions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.executions.read().await.is_empty()
    }

    pub async fn get_status(&self, id: ExecutionId) -> Result<Status, ExecutionError> {
        let entry = self.entry(id).await?;
        let status = entry.lock().await.status();
        Ok(status)
    }

    /// Snapshot of an execution.
    pub async fn snapshot(&self, id: ExecutionId) -> Result<Execution, ExecutionError> {
        let entry = self.entry(id).await?;
        let execution = entry.lock().await.clone();
        Ok(execution)
    }

    pub async fn change_step_status(
        &self,
        id: ExecutionId,
        step: StepId,
        status: Status,
    ) -> Result<StatusChangeOutcome, ExecutionError> {
        let entry = self.entry(id).await?;
        let mut execution = entry.lock().await;
        execution.change_step_status(step, status)
    }

    pub async fn remove_step(
        &self,
        id: ExecutionId,
        step: StepId,
    ) -> Result<StatusChangeOutcome, ExecutionError> {
        let entry = self.entry(id).await?;
        let mut execution = entry.lock().await;
        execution.remove_step(step)
    }

    async fn entry(&self, id: ExecutionId) -> Result<Arc<Mutex<Execution>>, ExecutionError> {
        self.executions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(ExecutionError::UnknownExecution(id))
    }
}
