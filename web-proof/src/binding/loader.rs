use super::native::LibraryResolver;
use super::platform::{candidate_locations, Platform};
use super::state::{BindingState, LoadStep};
use super::{CapabilityHandle, ModuleResolver};
use crate::config::ProofConfig;
use crate::error::WebProofError;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Loads the capability module once and caches the outcome.
///
/// The state lock is held for a whole resolution wave, so concurrent callers
/// never probe the candidates twice for the same attempt.
pub struct NativeBindingLoader {
    resolver: Arc<dyn ModuleResolver>,
    candidates: Vec<PathBuf>,
    max_attempts: u32,
    state: Mutex<BindingState>,
}

/// Snapshot of the loader, for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingInfo {
    pub loaded: bool,
    pub attempts: u32,
    pub terminal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub platform: Option<Platform>,
    pub candidates: Vec<PathBuf>,
}

impl NativeBindingLoader {
    pub fn new(
        resolver: Arc<dyn ModuleResolver>,
        candidates: Vec<PathBuf>,
        max_attempts: u32,
    ) -> Self {
        Self {
            resolver,
            candidates,
            max_attempts: max_attempts.max(1),
            state: Mutex::new(BindingState::default()),
        }
    }

    /// Shared-library loader over the configured or platform default locations.
    pub fn from_config(config: &ProofConfig) -> Self {
        Self::new(
            Arc::new(LibraryResolver),
            candidate_locations(config),
            config.max_load_attempts,
        )
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn state(&self) -> BindingState {
        self.lock().clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.lock().is_loaded()
    }

    pub fn info(&self) -> BindingInfo {
        let state = self.lock();
        BindingInfo {
            loaded: state.is_loaded(),
            attempts: state.attempts(),
            terminal: state.is_terminal(),
            location: state.handle().map(|h| h.location().to_path_buf()),
            last_error: state.last_error().map(ToString::to_string),
            platform: Platform::current(),
            candidates: self.candidates.clone(),
        }
    }

    /// Returns the cached handle, or runs one resolution wave.
    ///
    /// Once the attempt cap is reached, the last failure is returned on every
    /// call without probing any location again. A resolver that panics counts
    /// as a failed probe of that location.
    pub fn load(&self) -> Result<Arc<CapabilityHandle>, WebProofError> {
        let mut state = self.lock();

        match state.begin() {
            LoadStep::Ready(handle) => Ok(handle),
            LoadStep::Replay(err) => {
                debug!("native binding permanently unavailable: {}", err);
                Err(err)
            }
            LoadStep::Resolve => match self.resolve_candidates() {
                Ok(handle) => {
                    let handle = Arc::new(handle);
                    info!("native binding loaded from {}", handle.location().display());
                    state.succeed(handle.clone());
                    Ok(handle)
                }
                Err(err) => {
                    if state.fail(err.clone(), self.max_attempts) {
                        warn!(
                            "native binding failed {} times, giving up: {}",
                            state.attempts(),
                            err
                        );
                    } else {
                        warn!(
                            "native binding load attempt {}/{} failed: {}",
                            state.attempts(),
                            self.max_attempts,
                            err
                        );
                    }
                    Err(err)
                }
            },
        }
    }

    /// Probes the candidates in order. The first location that resolves
    /// decides the wave, whether or not it passes the surface check.
    fn resolve_candidates(&self) -> Result<CapabilityHandle, WebProofError> {
        if self.candidates.is_empty() {
            return Err(WebProofError::BindingLoad(
                "no candidate locations configured".to_string(),
            ));
        }

        let mut failures = Vec::with_capacity(self.candidates.len());
        for location in &self.candidates {
            // A panicking resolver must not leave the state stuck in `Loading`.
            let probe = panic::catch_unwind(AssertUnwindSafe(|| {
                self.resolver
                    .resolve(location)
                    .map(|module| CapabilityHandle::from_module(location, module.as_ref()))
            }));

            match probe {
                Ok(Ok(checked)) => {
                    debug!("resolved capability module at {}", location.display());
                    return checked;
                }
                Ok(Err(e)) => {
                    debug!("no capability module at {}: {:#}", location.display(), e);
                    failures.push(format!("{}: {:#}", location.display(), e));
                }
                Err(payload) => {
                    let reason = panic_message(payload.as_ref());
                    warn!("resolver panicked at {}: {}", location.display(), reason);
                    failures.push(format!(
                        "{}: resolver panicked: {}",
                        location.display(),
                        reason
                    ));
                }
            }
        }

        Err(WebProofError::BindingLoad(format!(
            "no candidate location could be loaded ({})",
            failures.join("; ")
        )))
    }

    fn lock(&self) -> MutexGuard<'_, BindingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{
        CapabilityModule, InProcessModule, InProcessResolver, GENERATE_SIMPLE_WEB_PROOF,
        GENERATE_WEB_PROOF,
    };
    use serde_json::Value;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn complete_module() -> InProcessModule {
        InProcessModule::new()
            .with_operation(GENERATE_WEB_PROOF, |_| async { Ok(Value::Null) })
            .with_operation(GENERATE_SIMPLE_WEB_PROOF, |_| async { Ok(Value::Null) })
    }

    fn loader(resolver: Arc<dyn ModuleResolver>, candidates: &[&str]) -> NativeBindingLoader {
        NativeBindingLoader::new(
            resolver,
            candidates.iter().map(PathBuf::from).collect(),
            3,
        )
    }

    /// Fails every probe until `fail_waves` waves have gone by.
    struct Flaky {
        fail_waves: usize,
        candidates: usize,
        probes: AtomicUsize,
    }

    impl ModuleResolver for Flaky {
        fn resolve(&self, _location: &Path) -> anyhow::Result<Arc<dyn CapabilityModule>> {
            let probe = self.probes.fetch_add(1, Ordering::SeqCst);
            if probe < self.fail_waves * self.candidates {
                anyhow::bail!("not yet");
            }
            Ok(Arc::new(complete_module()))
        }
    }

    #[test]
    fn test_load_is_idempotent() {
        let resolver =
            Arc::new(InProcessResolver::new().with_module("dist/engine.so", complete_module()));
        let loader = loader(resolver.clone(), &["engine.so", "dist/engine.so"]);

        let first = loader.load().unwrap();
        assert_eq!(first.location(), Path::new("dist/engine.so"));
        assert_eq!(resolver.probes(), 2);

        let second = loader.load().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.probes(), 2);
        assert!(loader.is_loaded());
    }

    #[test]
    fn test_bounded_retry_then_cached_failure() {
        let resolver = Arc::new(InProcessResolver::new());
        let loader = loader(resolver.clone(), &["a.so", "b.so"]);

        let mut errors = Vec::new();
        for _ in 0..3 {
            errors.push(loader.load().unwrap_err());
        }
        assert_eq!(resolver.probes(), 6);
        assert_eq!(loader.state().attempts(), 3);
        assert!(loader.state().is_terminal());

        for _ in 0..5 {
            assert_eq!(loader.load().unwrap_err(), errors[2]);
        }
        assert_eq!(resolver.probes(), 6);
        assert_eq!(loader.state().attempts(), 3);
    }

    #[test]
    fn test_load_error_lists_every_candidate() {
        let loader = loader(Arc::new(InProcessResolver::new()), &["a.so", "b.so"]);
        let err = loader.load().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BindingLoadFailure);
        let message = err.to_string();
        assert!(message.contains("a.so"));
        assert!(message.contains("b.so"));
    }

    #[test]
    fn test_no_candidates() {
        let loader = loader(Arc::new(InProcessResolver::new()), &[]);
        assert_eq!(
            loader.load().unwrap_err(),
            WebProofError::BindingLoad("no candidate locations configured".to_string())
        );
    }

    #[test]
    fn test_capability_missing_is_retryable() {
        let partial = InProcessModule::new()
            .with_operation(GENERATE_WEB_PROOF, |_| async { Ok(Value::Null) });
        let loader = loader(Arc::new(InProcessResolver::any(partial)), &["engine.so"]);

        let err = loader.load().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::CapabilityMissing);
        assert!(!loader.is_loaded());
        assert!(!loader.state().is_terminal());
        assert_eq!(loader.state().attempts(), 1);
    }

    #[test]
    fn test_capability_missing_turns_terminal_at_cap() {
        let partial = InProcessModule::new()
            .with_operation(GENERATE_WEB_PROOF, |_| async { Ok(Value::Null) });
        let resolver = Arc::new(InProcessResolver::any(partial));
        let loader = loader(resolver.clone(), &["engine.so"]);

        let errors: Vec<_> = (0..loader.max_attempts() + 2)
            .map(|_| loader.load().unwrap_err())
            .collect();

        assert_eq!(resolver.probes(), 3);
        assert!(loader.state().is_terminal());
        assert!(!loader.is_loaded());
        assert_eq!(loader.state().attempts(), 3);
        for err in &errors {
            assert_eq!(err.kind(), crate::error::ErrorKind::CapabilityMissing);
        }
        assert_eq!(errors[3], errors[2]);
        assert_eq!(errors[4], errors[2]);
    }

    struct Panicking;

    impl ModuleResolver for Panicking {
        fn resolve(&self, _location: &Path) -> anyhow::Result<Arc<dyn CapabilityModule>> {
            panic!("resolver bug");
        }
    }

    #[test]
    fn test_panicking_resolver_is_a_load_failure() {
        let loader = loader(Arc::new(Panicking), &["engine.so"]);

        let err = loader.load().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BindingLoadFailure);
        assert!(err.to_string().contains("resolver panicked: resolver bug"));
        assert!(matches!(
            loader.state(),
            BindingState::Failed {
                attempts: 1,
                terminal: false,
                ..
            }
        ));

        // The state lock is still usable and the next wave runs.
        assert!(loader.load().is_err());
        assert_eq!(loader.state().attempts(), 2);
    }

    #[test]
    fn test_from_config_uses_configured_candidates() {
        let config = ProofConfig::builder()
            .candidate_locations(vec![PathBuf::from("custom/engine.so")])
            .max_load_attempts(5u32)
            .build()
            .unwrap();
        let loader = NativeBindingLoader::from_config(&config);

        assert_eq!(loader.candidates(), [PathBuf::from("custom/engine.so")]);
        assert_eq!(loader.max_attempts(), 5);
        assert!(!loader.is_loaded());
    }

    #[test]
    fn test_recovers_within_attempt_cap() {
        let resolver = Arc::new(Flaky {
            fail_waves: 2,
            candidates: 2,
            probes: AtomicUsize::new(0),
        });
        let loader = loader(resolver.clone(), &["a.so", "b.so"]);

        assert!(loader.load().is_err());
        assert!(loader.load().is_err());
        let handle = loader.load().unwrap();
        assert_eq!(handle.location(), Path::new("a.so"));

        let info = loader.info();
        assert!(info.loaded);
        assert!(info.terminal);
        assert_eq!(info.attempts, 2);
        assert_eq!(info.location, Some(PathBuf::from("a.so")));
        assert!(info.last_error.is_none());
    }

    #[test]
    fn test_concurrent_loads_share_one_wave() {
        let resolver = Arc::new(InProcessResolver::any(complete_module()));
        let loader = Arc::new(loader(resolver.clone(), &["engine.so"]));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let loader = loader.clone();
                std::thread::spawn(move || loader.load().map(|h| h.location().to_path_buf()))
            })
            .collect();
        for thread in threads {
            assert_eq!(thread.join().unwrap().unwrap(), PathBuf::from("engine.so"));
        }
        assert_eq!(resolver.probes(), 1);
    }

    #[test]
    fn test_info_before_load() {
        let loader = loader(Arc::new(InProcessResolver::new()), &["engine.so"]);
        let info = loader.info();
        assert!(!info.loaded);
        assert_eq!(info.attempts, 0);
        assert_eq!(info.candidates, vec![PathBuf::from("engine.so")]);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["loaded"], Value::Bool(false));
        assert!(json.get("lastError").is_none());
    }
}
