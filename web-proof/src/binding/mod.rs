//! Discovery, loading and validation of the external capability module.
//!
//! The module is reached through a [`ModuleResolver`], which turns a candidate
//! location into a [`CapabilityModule`]. The loader accepts a module only when
//! it exposes every operation in [`REQUIRED_OPERATIONS`], and then caches the
//! resulting [`CapabilityHandle`] for the rest of its lifetime.

mod in_process;
mod loader;
mod native;
mod platform;
mod state;

pub use in_process::{InProcessModule, InProcessResolver};
pub use loader::{BindingInfo, NativeBindingLoader};
pub use native::LibraryResolver;
pub use platform::{candidate_locations, Platform};
pub use state::BindingState;

use crate::error::WebProofError;
use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const GENERATE_WEB_PROOF: &str = "generate_web_proof";
pub const GENERATE_SIMPLE_WEB_PROOF: &str = "generate_simple_web_proof";

/// Operations a module must expose to be trusted.
pub const REQUIRED_OPERATIONS: [&str; 2] = [GENERATE_WEB_PROOF, GENERATE_SIMPLE_WEB_PROOF];

/// Future returned by a capability operation. `Err` carries the module's own
/// error message.
pub type OperationFuture = BoxFuture<'static, Result<Value, String>>;

/// A callable capability operation taking positional JSON arguments.
pub type Operation = Arc<dyn Fn(Vec<Value>) -> OperationFuture + Send + Sync>;

/// A resolved module, queried by operation name.
pub trait CapabilityModule: Send + Sync {
    fn operation(&self, name: &str) -> Option<Operation>;
}

/// Turns a candidate location into a module.
///
/// Resolution is synchronous and must not have side effects beyond reading
/// the location.
pub trait ModuleResolver: Send + Sync {
    fn resolve(&self, location: &Path) -> anyhow::Result<Arc<dyn CapabilityModule>>;
}

/// A module that passed the capability-surface check.
#[derive(Clone)]
pub struct CapabilityHandle {
    location: PathBuf,
    web_proof: Operation,
    simple_web_proof: Operation,
}

impl CapabilityHandle {
    /// Fails with `CapabilityMissing` unless both required operations exist.
    pub(crate) fn from_module(
        location: &Path,
        module: &dyn CapabilityModule,
    ) -> Result<Self, WebProofError> {
        match (
            module.operation(GENERATE_WEB_PROOF),
            module.operation(GENERATE_SIMPLE_WEB_PROOF),
        ) {
            (Some(web_proof), Some(simple_web_proof)) => Ok(Self {
                location: location.to_path_buf(),
                web_proof,
                simple_web_proof,
            }),
            (web_proof, simple_web_proof) => {
                let missing = [
                    (GENERATE_WEB_PROOF, web_proof.is_none()),
                    (GENERATE_SIMPLE_WEB_PROOF, simple_web_proof.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, missing)| missing.then_some(name))
                .collect();

                Err(WebProofError::CapabilityMissing {
                    location: location.display().to_string(),
                    missing,
                })
            }
        }
    }

    /// Where the module was resolved from.
    pub fn location(&self) -> &Path {
        &self.location
    }

    pub(crate) fn web_proof(&self) -> &Operation {
        &self.web_proof
    }

    pub(crate) fn simple_web_proof(&self) -> &Operation {
        &self.simple_web_proof
    }
}

impl fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityHandle")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}
