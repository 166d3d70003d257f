use parking_lot::RwLock;
use std::sync::Arc;
use tracing::trace;

use super::task::FetchTask;

/// Tracks the in-flight asynchronous fetches of one extractor.
///
/// Locks are never held while a task is cancelled: cancellation fires the
/// task's completion, and completions call back into the registry.
#[derive(Default)]
pub struct FetchRegistry {
    tasks: RwLock<Vec<Arc<FetchTask>>>,
}

impl FetchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, task: Arc<FetchTask>) {
        let mut tasks = self.tasks.write();
        tasks.push(task);
        trace!(count = tasks.len(), "fetch registered");
    }

    /// Number of tracked fetches, including any settled ones not yet pruned.
    pub fn count(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn count_matching(&self, identity: &str) -> usize {
        self.tasks
            .read()
            .iter()
            .filter(|task| task.identity() == identity)
            .count()
    }

    pub fn is_running(&self) -> bool {
        self.tasks.read().iter().any(|task| task.is_pending())
    }

    /// Drops every settled fetch. A settled fetch whose linked follow-up has
    /// not started yet is kept, so the follow-up can still be cancelled by
    /// url. Returns how many were removed.
    pub fn remove_settled(&self) -> usize {
        let mut tasks = self.tasks.write();
        let before = tasks.len();
        tasks.retain(|task| task.is_pending());
        let removed = before - tasks.len();
        if removed > 0 {
            trace!(before, after = tasks.len(), "settled fetches pruned");
        }
        removed
    }

    /// Cancels and forgets every fetch. Returns whether anything is still
    /// running afterwards, which can only be fetches added concurrently.
    pub fn cancel_all(&self) -> bool {
        let tasks = std::mem::take(&mut *self.tasks.write());
        trace!(count = tasks.len(), "cancelling all fetches");
        for task in &tasks {
            task.cancel();
        }
        self.is_running()
    }

    /// Cancels every fetch whose identity equals `identity` and prunes all
    /// settled fetches. Returns whether any fetch is still running.
    pub fn cancel_matching(&self, identity: &str) -> bool {
        let targets: Vec<Arc<FetchTask>> = self
            .tasks
            .read()
            .iter()
            .filter(|task| task.identity() == identity)
            .cloned()
            .collect();

        for task in &targets {
            task.cancel();
        }
        let removed = self.remove_settled();
        trace!(identity, cancelled = targets.len(), removed, "fetches cancelled by url");
        self.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportSettings;
    use crate::fetch::task::{FetchMode, TaskContext, TaskState};
    use crate::io::{HttpTransport, ImageCrateDecoder};
    use crate::types::ChunkSize;

    fn task(url: &str) -> Arc<FetchTask> {
        FetchTask::from_source(url, FetchMode::Header(ChunkSize::Small), TransportSettings::default())
    }

    #[test]
    fn test_cancel_matching_keeps_other_urls() {
        let registry = FetchRegistry::new();
        let a1 = task("https://a.test/1.png");
        let b = task("https://b.test/1.png");
        let a2 = task("https://a.test/1.png");
        registry.add(Arc::clone(&a1));
        registry.add(Arc::clone(&b));
        registry.add(Arc::clone(&a2));
        assert_eq!(registry.count(), 3);

        assert!(registry.cancel_matching("https://a.test/1.png"));
        assert_eq!(registry.count(), 1);
        assert_eq!(a1.state(), TaskState::Invalidated);
        assert_eq!(a2.state(), TaskState::Invalidated);
        assert_eq!(b.state(), TaskState::Ready);
    }

    #[test]
    fn test_cancel_matching_prunes_unrelated_settled() {
        let registry = FetchRegistry::new();
        let done = task("https://a.test/1.png");
        let live = task("https://b.test/1.png");
        registry.add(Arc::clone(&done));
        registry.add(Arc::clone(&live));
        done.cancel();

        assert!(registry.cancel_matching("https://c.test/none.png"));
        assert_eq!(registry.count(), 1);
        assert_eq!(registry.count_matching("https://b.test/1.png"), 1);
    }

    #[test]
    fn test_cancel_all_empties_registry() {
        let registry = FetchRegistry::new();
        let tasks: Vec<_> = (0..4).map(|i| task(&format!("https://a.test/{i}.png"))).collect();
        for task in &tasks {
            registry.add(Arc::clone(task));
        }
        assert!(registry.is_running());

        assert!(!registry.cancel_all());
        assert_eq!(registry.count(), 0);
        assert!(tasks.iter().all(|task| task.state() == TaskState::Invalidated));
    }

    #[test]
    fn test_settled_task_with_waiting_follow_up_stays_cancellable() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let context = TaskContext::new(
            rt.handle().clone(),
            Arc::new(HttpTransport::new()),
            Arc::new(ImageCrateDecoder),
        );
        let registry = FetchRegistry::new();
        // never forms a request, so starting it fails on the spot
        let header = task("localhost");
        let full = FetchTask::from_source("localhost", FetchMode::Full, TransportSettings::default());
        header.chain(Arc::clone(&full));
        registry.add(Arc::clone(&header));

        header.start(&context, |_| {});
        assert_eq!(header.state(), TaskState::Invalidated);
        assert_eq!(registry.remove_settled(), 0);
        assert!(registry.is_running());

        assert!(!registry.cancel_matching("localhost"));
        assert_eq!(full.state(), TaskState::Invalidated);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_empty_registry() {
        let registry = FetchRegistry::new();
        assert!(!registry.is_running());
        assert!(!registry.cancel_all());
        assert!(!registry.cancel_matching("https://a.test/"));
        assert_eq!(registry.remove_settled(), 0);
    }
}
