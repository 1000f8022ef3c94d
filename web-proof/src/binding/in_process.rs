use super::{CapabilityModule, ModuleResolver, Operation};
use anyhow::bail;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A capability module implemented inside the current process, for engines
/// linked statically into the host.
#[derive(Clone, Default)]
pub struct InProcessModule {
    operations: HashMap<String, Operation>,
}

impl InProcessModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `operation` under `name`, replacing any previous entry.
    pub fn with_operation<F, Fut>(mut self, name: impl Into<String>, operation: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let boxed: Operation = Arc::new(move |args| operation(args).boxed());
        self.operations.insert(name.into(), boxed);
        self
    }
}

impl CapabilityModule for InProcessModule {
    fn operation(&self, name: &str) -> Option<Operation> {
        self.operations.get(name).cloned()
    }
}

/// Resolves candidate locations to registered [`InProcessModule`]s.
#[derive(Default)]
pub struct InProcessResolver {
    modules: HashMap<PathBuf, InProcessModule>,
    fallback: Option<InProcessModule>,
    probes: AtomicUsize,
}

impl InProcessResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every location to `module`.
    pub fn any(module: InProcessModule) -> Self {
        Self {
            fallback: Some(module),
            ..Self::default()
        }
    }

    /// Resolves exactly `location` to `module`.
    pub fn with_module(mut self, location: impl Into<PathBuf>, module: InProcessModule) -> Self {
        self.modules.insert(location.into(), module);
        self
    }

    /// Number of locations probed so far.
    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl ModuleResolver for InProcessResolver {
    fn resolve(&self, location: &Path) -> anyhow::Result<Arc<dyn CapabilityModule>> {
        self.probes.fetch_add(1, Ordering::SeqCst);

        match self.modules.get(location).or(self.fallback.as_ref()) {
            Some(module) => Ok(Arc::new(module.clone())),
            None => bail!("no in-process module registered at {}", location.display()),
        }
    }
}
