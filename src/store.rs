use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    AssignmentResult, SignalSnapshot, StoredAssignment, StoredTransition, TransitionRecord,
    WindowType,
};

#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Latest snapshot for the pair, `None` when nothing was computed yet.
    async fn load_snapshot(
        &self,
        user_id: &str,
        window: WindowType,
    ) -> Result<Option<SignalSnapshot>>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Append an assignment and return its generated id.
    async fn store_assignment(&self, result: &AssignmentResult) -> Result<Uuid>;

    /// Up to `limit` assignments for the pair, newest `assigned_at` first.
    async fn load_recent_assignments(
        &self,
        user_id: &str,
        window: WindowType,
        limit: usize,
    ) -> Result<Vec<StoredAssignment>>;

    /// Append a transition and return its generated id.
    async fn store_transition(&self, record: &TransitionRecord) -> Result<Uuid>;

    /// Every transition for the pair, newest first.
    async fn load_transitions(
        &self,
        user_id: &str,
        window: WindowType,
    ) -> Result<Vec<StoredTransition>>;
}

/// Process-local store for tests, demos and dry runs.
#[derive(Default)]
pub struct InMemoryStore {
    snapshots: RwLock<HashMap<(String, WindowType), SignalSnapshot>>,
    assignments: RwLock<Vec<StoredAssignment>>,
    transitions: RwLock<Vec<StoredTransition>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot served for the pair.
    pub async fn put_snapshot(&self, user_id: &str, window: WindowType, snapshot: SignalSnapshot) {
        self.snapshots
            .write()
            .await
            .insert((user_id.to_string(), window), snapshot);
    }

    pub async fn assignment_count(&self) -> usize {
        self.assignments.read().await.len()
    }

    pub async fn transition_count(&self) -> usize {
        self.transitions.read().await.len()
    }
}

#[async_trait]
impl SignalStore for InMemoryStore {
    async fn load_snapshot(
        &self,
        user_id: &str,
        window: WindowType,
    ) -> Result<Option<SignalSnapshot>> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(&(user_id.to_string(), window))
            .cloned())
    }
}

#[async_trait]
impl AssignmentStore for InMemoryStore {
    async fn store_assignment(&self, result: &AssignmentResult) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.assignments.write().await.push(StoredAssignment {
            id,
            result: result.clone(),
        });
        Ok(id)
    }

    async fn load_recent_assignments(
        &self,
        user_id: &str,
        window: WindowType,
        limit: usize,
    ) -> Result<Vec<StoredAssignment>> {
        // Walk newest insert first so equal timestamps keep insertion recency.
        let mut rows: Vec<StoredAssignment> = self
            .assignments
            .read()
            .await
            .iter()
            .rev()
            .filter(|row| row.result.user_id == user_id && row.result.window_type == window)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.result.assigned_at.cmp(&a.result.assigned_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn store_transition(&self, record: &TransitionRecord) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.transitions.write().await.push(StoredTransition {
            id,
            record: record.clone(),
        });
        Ok(id)
    }

    async fn load_transitions(
        &self,
        user_id: &str,
        window: WindowType,
    ) -> Result<Vec<StoredTransition>> {
        let mut rows: Vec<StoredTransition> = self
            .transitions
            .read()
            .await
            .iter()
            .rev()
            .filter(|row| row.record.user_id == user_id && row.record.window_type == window)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.record.transition_date.cmp(&a.record.transition_date));
        Ok(rows)
    }
}
