//! The four-phase pipeline driver.
//!
//! `execute` walks prepare -> begin filters -> dispatch -> end filters in
//! strict order. The first two phases raise failures straight out of the
//! call; dispatch captures its failures on the context so the end filters
//! always run; an end-filter failure wins over whatever dispatch stored.
//! Hooks are awaited one at a time - later hooks may depend on state
//! earlier ones left in `tags` or on the request.

use std::any::Any;

use courier_types::{ApiRequest, HookPhase, InvokeError};

use crate::cancel::MergedCancellation;
use crate::context::{DispatchOutcome, ExecutionContext};
use crate::validation;

impl ExecutionContext {
    /// Run the call to completion and downcast the materialized result.
    ///
    /// Returns the value the return hook (or an end filter) produced, or
    /// the single error that terminated the call: a validation or hook
    /// failure raised mid-pipeline, or the captured dispatch failure after
    /// every end filter has observed it.
    pub async fn execute<T: 'static>(mut self) -> Result<T, InvokeError> {
        tracing::debug!(
            call_id = %self.call_id(),
            method = self.method().name(),
            "Executing API call"
        );

        self.prepare().await?;
        self.run_begin_filters().await?;
        self.dispatch().await;
        self.run_end_filters().await?;
        self.finish()
    }

    /// Phase 1: validate arguments, build the request, run the
    /// request-building hooks in declared order.
    async fn prepare(&mut self) -> Result<(), InvokeError> {
        let method = self.method_handle();

        if self.config().validate_parameters() {
            for param in method.parameters() {
                validation::validate(param, self.argument(param.index()), true)?;
            }
        }

        let url = self
            .config()
            .base_url()
            .join(method.route())
            .map_err(|e| {
                InvokeError::Request(format!(
                    "cannot join route `{}` onto `{}`: {e}",
                    method.route(),
                    self.config().base_url()
                ))
            })?;
        self.set_request(ApiRequest::new(method.http_method().clone(), url));

        for hook in method.request_hooks() {
            hook.on_request(self)
                .await
                .map_err(|e| InvokeError::hook(hook.name(), HookPhase::Prepare, e))?;
        }

        for param in method.parameters() {
            let value = self
                .argument(param.index())
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            for hook in param.hooks() {
                hook.on_request(self, param, &value)
                    .await
                    .map_err(|e| InvokeError::hook(hook.name(), HookPhase::Prepare, e))?;
            }
        }

        let return_hook = method.return_hook();
        return_hook
            .on_request(self)
            .await
            .map_err(|e| InvokeError::hook(return_hook.name(), HookPhase::Prepare, e))?;

        Ok(())
    }

    /// Phase 2: global filters in registration order, then method filters
    /// in declaration order.
    async fn run_begin_filters(&mut self) -> Result<(), InvokeError> {
        let config = self.config_handle();
        let method = self.method_handle();
        for filter in config.global_filters().iter().chain(method.filters()) {
            filter
                .on_begin_request(self)
                .await
                .map_err(|e| InvokeError::hook(filter.name(), HookPhase::BeginRequest, e))?;
        }
        Ok(())
    }

    /// Phase 3: merge cancellation signals, send, materialize. Failures
    /// are captured on the context, never raised.
    async fn dispatch(&mut self) {
        let signals = self.begin_dispatch().to_vec();
        let merged = MergedCancellation::merge(&signals);

        let outcome = match self.dispatch_inner(&merged).await {
            Ok(value) => DispatchOutcome::Value(value),
            Err(err) => {
                tracing::debug!(
                    call_id = %self.call_id(),
                    error = %err,
                    "Dispatch failure captured"
                );
                DispatchOutcome::Failure(err)
            }
        };
        self.set_outcome(outcome);
        // merged (and every signal clone it holds) is released here on all
        // paths
    }

    async fn dispatch_inner(
        &mut self,
        cancel: &MergedCancellation,
    ) -> Result<Box<dyn Any + Send>, InvokeError> {
        if cancel.is_cancelled() {
            return Err(InvokeError::Cancelled);
        }

        let request = self
            .take_request()
            .ok_or_else(|| InvokeError::Request("request was never prepared".to_string()))?;

        let transport = self.config().transport();
        let response = transport.send(request, cancel).await?;
        tracing::debug!(
            call_id = %self.call_id(),
            status = response.status().as_u16(),
            "Response received"
        );
        self.set_response(response);

        let return_hook = self.method_handle().return_hook();
        return_hook
            .materialize(self)
            .await
            .map_err(InvokeError::Materialize)
    }

    /// Phase 4: the same two-tier filter order as phase 2, run whether
    /// dispatch succeeded or captured a failure. A filter error here
    /// replaces the stored outcome as the call's result.
    async fn run_end_filters(&mut self) -> Result<(), InvokeError> {
        let config = self.config_handle();
        let method = self.method_handle();
        for filter in config.global_filters().iter().chain(method.filters()) {
            filter
                .on_end_request(self)
                .await
                .map_err(|e| InvokeError::hook(filter.name(), HookPhase::EndRequest, e))?;
        }
        Ok(())
    }

    fn finish<T: 'static>(mut self) -> Result<T, InvokeError> {
        match self.take_outcome() {
            Some(DispatchOutcome::Value(value)) => {
                value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
                    InvokeError::TypeMismatch {
                        expected: std::any::type_name::<T>(),
                        declared: self.method().return_hook().produced_type(),
                    }
                })
            }
            Some(DispatchOutcome::Failure(err)) => Err(err),
            None => Err(InvokeError::Request(
                "dispatch produced no outcome".to_string(),
            )),
        }
    }
}


#[cfg(test)]
mod integration_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use http::Method;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use courier_types::InvokeError;

    use crate::config::ClientConfig;
    use crate::context::ExecutionContext;
    use crate::descriptor::{MethodDescriptor, ParameterDescriptorBuilder};
    use crate::hooks::{HeaderParam, JsonReturn, TraceFilter};
    use crate::transport::HttpTransport;
    use crate::validation::Constraint;

    use crate::hooks::Filter;

    /// End filter that counts the captured failures it observes.
    struct FailureObserver {
        failures_seen: Arc<AtomicUsize>,
    }

    impl FailureObserver {
        fn new() -> Self {
            Self {
                failures_seen: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failures_seen(&self) -> Arc<AtomicUsize> {
            Arc::clone(&self.failures_seen)
        }
    }

    #[async_trait]
    impl Filter for FailureObserver {
        fn name(&self) -> &str {
            "failure-observer"
        }

        async fn on_end_request(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
            if ctx.failure().is_some() {
                self.failures_seen.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    fn config_for(server_uri: &str) -> ClientConfig {
        ClientConfig::builder(format!("{server_uri}/"))
            .transport(HttpTransport::with_client(reqwest::Client::new()))
            .global_filter(TraceFilter)
            .build()
            .unwrap()
    }

    fn answer_descriptor() -> MethodDescriptor {
        MethodDescriptor::builder("get_answer", Method::GET, "answer")
            .parameter(
                ParameterDescriptorBuilder::new("p-one")
                    .constraint(Constraint::Required)
                    .hook(HeaderParam::new()),
            )
            .parameter(
                ParameterDescriptorBuilder::new("p-two")
                    .constraint(Constraint::Required)
                    .hook(HeaderParam::new()),
            )
            .returning(JsonReturn::<i64>::new())
            .build()
    }

    #[tokio::test]
    async fn full_pipeline_materializes_a_typed_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/answer"))
            .and(header("p-one", "1"))
            .and(header("p-two", "2"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("42"))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = ExecutionContext::new(
            Arc::new(config_for(&server.uri())),
            Arc::new(answer_descriptor()),
            vec![json!("1"), json!("2")],
        );
        let value: i64 = ctx.execute().await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn network_failure_is_raised_after_the_end_filters_observe_it() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let filter = FailureObserver::new();
        let failures = filter.failures_seen();
        let config = ClientConfig::builder(format!("{uri}/"))
            .transport(HttpTransport::with_client(reqwest::Client::new()))
            .global_filter(filter)
            .build()
            .unwrap();

        let ctx = ExecutionContext::new(
            Arc::new(config),
            Arc::new(answer_descriptor()),
            vec![json!("1"), json!("2")],
        );
        let err = ctx.execute::<i64>().await.unwrap_err();
        assert!(matches!(err, InvokeError::Transport(_)), "got {err:?}");
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn error_status_fails_materialization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/answer"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such answer"))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = ExecutionContext::new(
            Arc::new(config_for(&server.uri())),
            Arc::new(answer_descriptor()),
            vec![json!("1"), json!("2")],
        );
        let err = ctx.execute::<i64>().await.unwrap_err();
        assert!(matches!(err, InvokeError::Materialize(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn cancellation_during_a_slow_exchange_is_captured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/answer"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("42")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let mut ctx = ExecutionContext::new(
            Arc::new(config_for(&server.uri())),
            Arc::new(answer_descriptor()),
            vec![json!("1"), json!("2")],
        );
        let token = CancellationToken::new();
        ctx.add_cancellation_signal(token.clone());

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let err = ctx.execute::<i64>().await.unwrap_err();
        trigger.await.unwrap();
        assert!(err.is_cancelled(), "got {err:?}");
    }
}
