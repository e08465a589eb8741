//! Cache of job managers keyed by backend and target
//!
//! Repeated submissions to the same destination share one configured [`JobManager`]. The registry
//! is an ordinary value: create one and pass it to whatever submits jobs. All access goes through a
//! single mutex, so two threads can never build two managers for the same key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::info;

use crate::backend::Backend;
use crate::error::Result;
use crate::manager::JobManager;

#[derive(Debug, Default)]
pub struct ManagerRegistry {
    managers: Mutex<HashMap<String, Arc<JobManager>>>,
}

impl ManagerRegistry {
    pub fn new() -> ManagerRegistry {
        ManagerRegistry::default()
    }

    /// Cache key, joined as given: no case folding or path normalisation
    pub fn key(backend: &str, target: &str) -> String {
        format!("{}-{}", backend, target)
    }

    pub fn get(&self, backend: &str, target: &str) -> Option<Arc<JobManager>> {
        self.lock().get(&Self::key(backend, target)).cloned()
    }

    /// Return the cached manager, or create one with scheduler commands under `bin_path`
    pub fn get_or_create(&self, backend: &str, target: &str, bin_path: &str) -> Result<Arc<JobManager>> {
        self.get_or_create_with(backend, target, |kind| Ok(JobManager::new(kind, target, bin_path)))
    }

    /// Like [`ManagerRegistry::get_or_create`], with the caller building the manager
    pub fn get_or_create_with<F>(&self, backend: &str, target: &str, create: F) -> Result<Arc<JobManager>>
    where
        F: FnOnce(Backend) -> Result<JobManager>,
    {
        let key = Self::key(backend, target);
        let mut managers = self.lock();
        if let Some(manager) = managers.get(&key) {
            return Ok(manager.clone());
        }

        let kind: Backend = backend.parse()?;
        let manager = Arc::new(create(kind)?);
        info!("Created {} job manager for {}", kind, target);
        managers.insert(key, manager.clone());
        Ok(manager)
    }

    /// Forget a manager, e.g. after its target became unreachable
    pub fn remove(&self, backend: &str, target: &str) -> Option<Arc<JobManager>> {
        self.lock().remove(&Self::key(backend, target))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<JobManager>>> {
        self.managers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
