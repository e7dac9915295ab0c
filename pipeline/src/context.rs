//! Per-call execution state.

use std::any::Any;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use courier_types::{ApiRequest, ApiResponse, InvokeError, Tags};

use crate::config::ClientConfig;
use crate::descriptor::MethodDescriptor;

/// What the dispatch phase produced: a materialized value or a captured
/// failure. Exactly one, never both.
///
/// End filters may inspect and replace the outcome - typically swapping a
/// captured failure for a fallback value.
pub enum DispatchOutcome {
    /// The materialized result, to be downcast to the caller's type.
    Value(Box<dyn Any + Send>),
    /// A captured dispatch failure, re-raised after the end filters run.
    Failure(InvokeError),
}

impl DispatchOutcome {
    #[must_use]
    pub const fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    #[must_use]
    pub const fn failure(&self) -> Option<&InvokeError> {
        match self {
            Self::Failure(err) => Some(err),
            Self::Value(_) => None,
        }
    }

    /// Borrow the materialized value if it has type `T`.
    #[must_use]
    pub fn value_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Value(value) => value.downcast_ref(),
            Self::Failure(_) => None,
        }
    }
}

impl std::fmt::Debug for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Value(..)"),
            Self::Failure(err) => f.debug_tuple("Failure").field(err).finish(),
        }
    }
}

/// Mutable state for one API call invocation.
///
/// One instance per call, owned exclusively by the call's async flow and
/// never reused - [`ExecutionContext::execute`] consumes it. All pipeline
/// logic operates on or through this record; none of its own methods
/// perform IO.
pub struct ExecutionContext {
    call_id: Uuid,
    config: Arc<ClientConfig>,
    method: Arc<MethodDescriptor>,
    arguments: Vec<serde_json::Value>,
    request: Option<ApiRequest>,
    response: Option<ApiResponse>,
    outcome: Option<DispatchOutcome>,
    tags: Option<Tags>,
    cancellation_signals: Option<Vec<CancellationToken>>,
    dispatch_started: bool,
}

impl ExecutionContext {
    /// Create the context for one call.
    ///
    /// `arguments` are index-aligned with the descriptor's parameters;
    /// missing trailing arguments are visible to the validator as absent.
    #[must_use]
    pub fn new(
        config: Arc<ClientConfig>,
        method: Arc<MethodDescriptor>,
        arguments: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            call_id: Uuid::new_v4(),
            config,
            method,
            arguments,
            request: None,
            response: None,
            outcome: None,
            tags: None,
            cancellation_signals: None,
            dispatch_started: false,
        }
    }

    /// Correlates every log line this call emits.
    #[must_use]
    pub const fn call_id(&self) -> Uuid {
        self.call_id
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn config_handle(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.config)
    }

    #[must_use]
    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    pub(crate) fn method_handle(&self) -> Arc<MethodDescriptor> {
        Arc::clone(&self.method)
    }

    #[must_use]
    pub fn arguments(&self) -> &[serde_json::Value] {
        &self.arguments
    }

    /// The argument at a parameter's declared position.
    #[must_use]
    pub fn argument(&self, index: usize) -> Option<&serde_json::Value> {
        self.arguments.get(index)
    }

    /// The outgoing request; absent until the prepare phase builds it and
    /// again after dispatch consumes it.
    #[must_use]
    pub const fn request(&self) -> Option<&ApiRequest> {
        self.request.as_ref()
    }

    pub fn request_mut(&mut self) -> Option<&mut ApiRequest> {
        self.request.as_mut()
    }

    pub(crate) fn set_request(&mut self, request: ApiRequest) {
        self.request = Some(request);
    }

    pub(crate) fn take_request(&mut self) -> Option<ApiRequest> {
        self.request.take()
    }

    /// The raw response; set exactly once, only on a successful exchange.
    #[must_use]
    pub const fn response(&self) -> Option<&ApiResponse> {
        self.response.as_ref()
    }

    pub(crate) fn set_response(&mut self, response: ApiResponse) {
        self.response = Some(response);
    }

    /// The tag store, created on first access and kept for the life of the
    /// context.
    pub fn tags_mut(&mut self) -> &mut Tags {
        self.tags.get_or_insert_with(Tags::new)
    }

    /// The tag store, if any hook has touched it yet.
    #[must_use]
    pub const fn tags(&self) -> Option<&Tags> {
        self.tags.as_ref()
    }

    /// Register an external cancellation signal for the dispatch phase.
    ///
    /// Signals registered after dispatch has started are ignored - the
    /// merge has already happened.
    pub fn add_cancellation_signal(&mut self, signal: CancellationToken) {
        if self.dispatch_started {
            return;
        }
        self.cancellation_signals
            .get_or_insert_with(Vec::new)
            .push(signal);
    }

    /// The signals registered so far, in registration order.
    #[must_use]
    pub fn cancellation_signals(&self) -> &[CancellationToken] {
        self.cancellation_signals.as_deref().unwrap_or(&[])
    }

    pub(crate) fn begin_dispatch(&mut self) -> &[CancellationToken] {
        self.dispatch_started = true;
        self.cancellation_signals.as_deref().unwrap_or(&[])
    }

    /// The dispatch outcome; `None` until the dispatch phase has run.
    #[must_use]
    pub const fn outcome(&self) -> Option<&DispatchOutcome> {
        self.outcome.as_ref()
    }

    /// The captured failure, if dispatch failed.
    #[must_use]
    pub const fn failure(&self) -> Option<&InvokeError> {
        match self.outcome() {
            Some(outcome) => outcome.failure(),
            None => None,
        }
    }

    /// Replace the outcome with a successful value.
    ///
    /// Intended for end filters substituting a fallback after a captured
    /// failure; the pipeline itself stores the materialized result here.
    pub fn set_result<T: Any + Send>(&mut self, value: T) {
        self.outcome = Some(DispatchOutcome::Value(Box::new(value)));
    }

    /// Take the captured failure out of the outcome, leaving it empty.
    pub fn take_failure(&mut self) -> Option<InvokeError> {
        match self.outcome.take() {
            Some(DispatchOutcome::Failure(err)) => Some(err),
            other => {
                self.outcome = other;
                None
            }
        }
    }

    pub(crate) fn set_outcome(&mut self, outcome: DispatchOutcome) {
        self.outcome = Some(outcome);
    }

    pub(crate) fn take_outcome(&mut self) -> Option<DispatchOutcome> {
        self.outcome.take()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("call_id", &self.call_id)
            .field("method", &self.method.name())
            .field("dispatch_started", &self.dispatch_started)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}
