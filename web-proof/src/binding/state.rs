use super::CapabilityHandle;
use crate::error::WebProofError;
use std::sync::Arc;

/// Lifecycle of the capability binding.
///
/// `Loaded` and terminal `Failed` are absorbing: once reached, no transition
/// leaves them.
#[derive(Clone, Debug, Default)]
pub enum BindingState {
    #[default]
    Unloaded,
    /// A resolution wave is in progress.
    Loading { attempts: u32 },
    Loaded {
        handle: Arc<CapabilityHandle>,
        attempts: u32,
    },
    Failed {
        attempts: u32,
        last_error: WebProofError,
        terminal: bool,
    },
}

/// What a load request has to do, given the current state.
#[derive(Debug)]
pub(crate) enum LoadStep {
    Ready(Arc<CapabilityHandle>),
    Replay(WebProofError),
    Resolve,
}

impl BindingState {
    /// Failed resolution waves so far.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Unloaded => 0,
            Self::Loading { attempts }
            | Self::Loaded { attempts, .. }
            | Self::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded { .. })
    }

    /// True once the state can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Loaded { .. } | Self::Failed { terminal: true, .. }
        )
    }

    pub fn handle(&self) -> Option<&Arc<CapabilityHandle>> {
        match self {
            Self::Loaded { handle, .. } => Some(handle),
            _ => None,
        }
    }

    pub fn last_error(&self) -> Option<&WebProofError> {
        match self {
            Self::Failed { last_error, .. } => Some(last_error),
            _ => None,
        }
    }

    /// Enters `Loading` unless the state already settles the request.
    pub(crate) fn begin(&mut self) -> LoadStep {
        match self {
            Self::Loaded { handle, .. } => LoadStep::Ready(handle.clone()),
            Self::Failed {
                terminal: true,
                last_error,
                ..
            } => LoadStep::Replay(last_error.clone()),
            Self::Unloaded | Self::Loading { .. } | Self::Failed { .. } => {
                *self = Self::Loading {
                    attempts: self.attempts(),
                };
                LoadStep::Resolve
            }
        }
    }

    pub(crate) fn succeed(&mut self, handle: Arc<CapabilityHandle>) {
        *self = Self::Loaded {
            handle,
            attempts: self.attempts(),
        };
    }

    /// Records a failed wave and returns whether the failure is now permanent.
    pub(crate) fn fail(&mut self, error: WebProofError, max_attempts: u32) -> bool {
        let attempts = self.attempts().saturating_add(1);
        let terminal = attempts >= max_attempts;
        *self = Self::Failed {
            attempts,
            last_error: error,
            terminal,
        };
        terminal
    }
}
