//! Process registry: tunnel id to live process handle

use super::{SpawnSpec, TunnelProcess};
use crate::error::{AppError, Result};
use crate::types::TunnelId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Outcome of [`ProcessRegistry::terminate_all`]
#[derive(Debug, Default)]
pub struct TerminationReport {
    pub terminated: Vec<TunnelId>,
    pub failures: Vec<(TunnelId, AppError)>,
}

impl TerminationReport {
    /// True when every group was signalled without error
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of tunnels the call touched
    pub fn total(&self) -> usize {
        self.terminated.len() + self.failures.len()
    }
}

/// Shared handle on the set of supervised tunnels.
///
/// Clones share the same map, so the shutdown task and the main loop see the
/// same registry.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    tunnels: Arc<Mutex<HashMap<TunnelId, Arc<TunnelProcess>>>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a tunnel under `id`.
    ///
    /// An entry whose process already exited is replaced; a live one is a
    /// `DuplicateId` error.
    pub fn create(&self, id: TunnelId, spec: &SpawnSpec) -> Result<Arc<TunnelProcess>> {
        let mut tunnels = self.lock();
        if let Some(existing) = tunnels.get(&id) {
            if existing.is_alive() {
                return Err(AppError::DuplicateId(id));
            }
            tunnels.remove(&id);
        }

        let process = Arc::new(TunnelProcess::spawn(id, spec)?);
        tunnels.insert(id, Arc::clone(&process));
        Ok(process)
    }

    /// Find a live tunnel. Entries for exited processes are dropped.
    pub fn lookup(&self, id: TunnelId) -> Result<Arc<TunnelProcess>> {
        let mut tunnels = self.lock();
        match tunnels.get(&id) {
            Some(process) if process.is_alive() => Ok(Arc::clone(process)),
            Some(_) => {
                tunnels.remove(&id);
                Err(AppError::NotFound(id))
            }
            None => Err(AppError::NotFound(id)),
        }
    }

    /// Terminate every registered group and empty the registry.
    ///
    /// Best effort: a failure on one tunnel is recorded and the rest are still
    /// terminated. Calling it again on an empty registry does nothing.
    pub fn terminate_all(&self) -> TerminationReport {
        let mut tunnels = self.lock();
        let mut report = TerminationReport::default();

        for (id, process) in tunnels.drain() {
            match process.terminate() {
                Ok(()) => report.terminated.push(id),
                Err(e) => report.failures.push((id, e)),
            }
        }

        report.terminated.sort();
        report.failures.sort_by_key(|(id, _)| *id);
        report
    }

    /// Registered ids, ascending
    pub fn ids(&self) -> Vec<TunnelId> {
        let mut ids: Vec<_> = self.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TunnelId, Arc<TunnelProcess>>> {
        self.tunnels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TunnelState;
    use std::time::Duration;

    fn id(raw: u32) -> TunnelId {
        TunnelId::new(raw).unwrap()
    }

    fn cat() -> SpawnSpec {
        SpawnSpec::new("cat", vec![])
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let registry = ProcessRegistry::new();
        let created = registry.create(id(1), &cat()).unwrap();
        let found = registry.lookup(id(1)).unwrap();

        assert!(Arc::ptr_eq(&created, &found));
        assert_eq!(registry.ids(), vec![id(1)]);
        registry.terminate_all();
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let registry = ProcessRegistry::new();
        registry.create(id(7), &cat()).unwrap();

        let error = registry.create(id(7), &cat()).unwrap_err();
        assert!(matches!(error, AppError::DuplicateId(dup) if dup == id(7)));
        assert_eq!(registry.len(), 1);
        registry.terminate_all();
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_registry_unchanged() {
        let registry = ProcessRegistry::new();
        let spec = SpawnSpec::new("no-such-tunnel-launcher", vec![]);

        let error = registry.create(id(2), &spec).unwrap_err();
        assert_eq!(error.category(), "SPAWN");
        assert!(registry.is_empty());
        assert!(matches!(registry.lookup(id(2)), Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_lookup_unknown_id_is_not_found() {
        let registry = ProcessRegistry::new();
        let error = registry.lookup(id(42)).unwrap_err();
        assert!(matches!(error, AppError::NotFound(missing) if missing == id(42)));
    }

    #[tokio::test]
    async fn test_terminate_all_empties_registry() {
        let registry = ProcessRegistry::new();
        let first = registry.create(id(1), &cat()).unwrap();
        let second = registry.create(id(2), &cat()).unwrap();

        let report = registry.terminate_all();
        assert!(report.is_clean());
        assert_eq!(report.terminated, vec![id(1), id(2)]);

        assert!(registry.is_empty());
        assert!(registry.lookup(id(1)).is_err());
        assert!(registry.lookup(id(2)).is_err());
        assert_eq!(first.state(), TunnelState::Terminated);
        assert_eq!(second.state(), TunnelState::Terminated);

        let again = registry.terminate_all();
        assert_eq!(again.total(), 0);
    }

    #[tokio::test]
    async fn test_exited_process_frees_its_id() {
        let registry = ProcessRegistry::new();
        let spec = SpawnSpec::new("sh", vec!["-c".to_string(), "exit 0".to_string()]);
        let process = registry.create(id(3), &spec).unwrap();
        assert_eq!(process.read_line().await.unwrap(), "");

        let mut gone = false;
        for _ in 0..50 {
            if registry.lookup(id(3)).is_err() {
                gone = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(gone);
        assert!(registry.is_empty());

        registry.create(id(3), &cat()).unwrap();
        assert_eq!(registry.len(), 1);
        registry.terminate_all();
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let registry = ProcessRegistry::new();
        let shutdown_view = registry.clone();
        registry.create(id(5), &cat()).unwrap();

        assert_eq!(shutdown_view.len(), 1);
        shutdown_view.terminate_all();
        assert!(registry.is_empty());
    }
}
