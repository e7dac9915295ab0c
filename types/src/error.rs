//! The error taxonomy for a pipeline run.
//!
//! Two propagation regimes share this one enum. Failures raised while the
//! request is being prepared or intercepted (`Validation`, `Hook`,
//! `Request`) unwind out of the pipeline immediately. Failures raised while
//! the request is in flight (`Transport`, `Cancelled`, `Materialize`) are
//! captured on the execution context so the end-of-call interceptors still
//! run, and are only re-raised afterwards.

use std::fmt;

use thiserror::Error;

/// The pipeline phase in which a hook failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// Request-building steps: method-level, parameter-level, and
    /// return-handling `on_request` hooks.
    Prepare,
    /// Begin-request interceptors (global, then method-level).
    BeginRequest,
    /// End-request interceptors, run after dispatch regardless of outcome.
    EndRequest,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            Self::Prepare => "prepare",
            Self::BeginRequest => "begin-request",
            Self::EndRequest => "end-request",
        };
        f.write_str(phase)
    }
}

/// Everything that can go wrong while executing an API call.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// An argument violated its parameter's declared constraints.
    ///
    /// Raised during prepare, before any hook runs; aborts the whole call.
    #[error("parameter `{parameter}` failed validation: {reason}")]
    Validation { parameter: String, reason: String },

    /// A hook raised. Propagated immediately, except in the end-request
    /// phase where it replaces whatever outcome dispatch had stored.
    #[error("hook `{hook}` failed during {phase}")]
    Hook {
        hook: String,
        phase: HookPhase,
        #[source]
        source: anyhow::Error,
    },

    /// The request representation itself was invalid - a malformed header
    /// value, a route that cannot be joined onto the base URL, a body that
    /// cannot be encoded.
    #[error("invalid request: {0}")]
    Request(String),

    /// The HTTP exchange failed before a response was read back.
    ///
    /// Only produced by the dispatch phase; always captured.
    #[error("transport failure")]
    Transport(#[source] anyhow::Error),

    /// The merged cancellation source fired before or during the transport
    /// call. Only produced by the dispatch phase; always captured.
    #[error("call cancelled")]
    Cancelled,

    /// The return hook could not turn the stored response into a value.
    ///
    /// Only produced by the dispatch phase; always captured.
    #[error("failed to materialize response")]
    Materialize(#[source] anyhow::Error),

    /// The caller's requested result type disagrees with what the return
    /// hook produced.
    #[error("result type mismatch: caller requested `{expected}`, return hook produces `{declared}`")]
    TypeMismatch {
        expected: &'static str,
        declared: &'static str,
    },
}

impl InvokeError {
    /// Build a [`InvokeError::Hook`] naming the failed hook and phase.
    pub fn hook(hook: impl Into<String>, phase: HookPhase, source: anyhow::Error) -> Self {
        Self::Hook {
            hook: hook.into(),
            phase,
            source,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True for the kinds that dispatch captures on the context instead of
    /// raising: transport failures, cancellation, and materialization
    /// failures.
    #[must_use]
    pub const fn is_captured_kind(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Cancelled | Self::Materialize(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{HookPhase, InvokeError};

    #[test]
    fn captured_kinds_are_exactly_the_dispatch_failures() {
        assert!(InvokeError::Transport(anyhow::anyhow!("boom")).is_captured_kind());
        assert!(InvokeError::Cancelled.is_captured_kind());
        assert!(InvokeError::Materialize(anyhow::anyhow!("boom")).is_captured_kind());

        assert!(
            !InvokeError::Validation {
                parameter: "id".to_string(),
                reason: "value is required".to_string(),
            }
            .is_captured_kind()
        );
        assert!(
            !InvokeError::hook("trace", HookPhase::Prepare, anyhow::anyhow!("boom"))
                .is_captured_kind()
        );
    }

    #[test]
    fn validation_error_names_the_parameter() {
        let err = InvokeError::Validation {
            parameter: "user_id".to_string(),
            reason: "value is required".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("user_id"), "got: {message}");
        assert!(message.contains("value is required"), "got: {message}");
    }

    #[test]
    fn hook_error_names_hook_and_phase() {
        let err = InvokeError::hook("auth", HookPhase::BeginRequest, anyhow::anyhow!("expired"));
        let message = err.to_string();
        assert!(message.contains("auth"), "got: {message}");
        assert!(message.contains("begin-request"), "got: {message}");
    }
}
