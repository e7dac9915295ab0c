//! Request-execution pipeline for declarative HTTP API invocation.
//!
//! # Architecture
//!
//! A call is described once, up front, by an immutable [`MethodDescriptor`]
//! (parameters, hooks, return handling) and executed any number of times
//! through a per-call [`ExecutionContext`]:
//!
//! ```text
//! ClientConfig (process-wide, read-only)
//! ├── transport: Arc<dyn Transport>
//! ├── validate_parameters: bool
//! └── global_filters: immutable snapshot
//!
//! MethodDescriptor (per method signature, immutable)
//! ├── parameters: [ParameterDescriptor { hooks, constraints }]
//! ├── request_hooks / filters
//! └── return_hook
//!
//! ExecutionContext (per call, never reused)
//! └── execute::<T>() - prepare -> begin filters -> dispatch -> end filters
//! ```
//!
//! # Phases
//!
//! | Phase | Steps | Failure policy |
//! |-------|-------|----------------|
//! | Prepare | validate, build request, request hooks | raised immediately |
//! | Begin filters | global then method `on_begin_request` | raised immediately |
//! | Dispatch | cancellation merge, transport, materialize | captured on the context |
//! | End filters | global then method `on_end_request` | overrides captured outcome |
//!
//! Dispatch is the one phase whose failures are captured rather than
//! raised, so end filters always observe the outcome (for logging, metrics,
//! or substituting a fallback value) before the caller does.
//!
//! # Cancellation
//!
//! Callers append [`tokio_util::sync::CancellationToken`]s to the context
//! before execution; dispatch merges them into one effective source. A
//! signal that is already cancelled at merge time prevents the transport
//! from being invoked at all.

mod cancel;
mod config;
mod context;
mod descriptor;
mod driver;
mod hooks;
mod transport;
mod validation;

pub use cancel::MergedCancellation;
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
pub use context::{DispatchOutcome, ExecutionContext};
pub use descriptor::{
    MethodDescriptor, MethodDescriptorBuilder, ParameterDescriptor, ParameterDescriptorBuilder,
};
pub use hooks::{
    Filter, HeaderParam, JsonBodyParam, JsonReturn, ParameterHook, PathParam, QueryParam,
    RawReturn, RequestHook, ReturnHook, StaticHeader, TextReturn, TraceFilter,
};
pub use transport::{shared_client, HttpTransport, Transport};
pub use validation::{validate, Constraint, PropertyConstraint};

pub use courier_types::{ApiRequest, ApiResponse, HookPhase, InvokeError, RequestBody, Tags};
