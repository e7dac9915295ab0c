//! Extension-point traits and the stock hook set.
//!
//! Four hook shapes plug into fixed points of the pipeline:
//!
//! - [`RequestHook`] - method-level request building (prepare phase)
//! - [`ParameterHook`] - parameter-scoped request building (prepare phase,
//!   run per parameter in declared order)
//! - [`Filter`] - begin/end interception around dispatch, registered
//!   globally on the config or per method on the descriptor
//! - [`ReturnHook`] - request-side preparation plus materialization of the
//!   typed result from the stored response
//!
//! Every step receives the execution context and may mutate it or fail;
//! failures carry [`anyhow::Error`] and the pipeline wraps them with the
//! hook's name and phase.

use std::any::Any;
use std::marker::PhantomData;

use anyhow::Context as _;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use courier_types::{ApiResponse, RequestBody};

use crate::context::{DispatchOutcome, ExecutionContext};
use crate::descriptor::ParameterDescriptor;

const MAX_ERROR_BODY_CHARS: usize = 2048;

/// Method-level request-building step.
#[async_trait]
pub trait RequestHook: Send + Sync {
    /// Identifies the hook in errors and logs.
    fn name(&self) -> &str;

    async fn on_request(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()>;
}

/// Parameter-scoped request-building step.
///
/// Runs once per call for its parameter, receiving the descriptor and the
/// argument value at the parameter's declared position.
#[async_trait]
pub trait ParameterHook: Send + Sync {
    fn name(&self) -> &str;

    async fn on_request(
        &self,
        ctx: &mut ExecutionContext,
        param: &ParameterDescriptor,
        value: &Value,
    ) -> anyhow::Result<()>;
}

/// Begin/end interceptor around the dispatch phase.
///
/// `on_begin_request` sees the fully-prepared request; `on_end_request`
/// runs after dispatch whether it succeeded or captured a failure, and may
/// inspect or replace the outcome. Both default to no-ops.
#[async_trait]
pub trait Filter: Send + Sync {
    fn name(&self) -> &str;

    async fn on_begin_request(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }

    async fn on_end_request(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }
}

/// Return handling: one per method descriptor.
#[async_trait]
pub trait ReturnHook: Send + Sync {
    fn name(&self) -> &str;

    /// The type `materialize` produces, for type-mismatch diagnostics.
    fn produced_type(&self) -> &'static str {
        "unknown"
    }

    /// Request-side step, run last in the prepare phase.
    async fn on_request(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Turn the stored response into the call's result value.
    ///
    /// Invoked only after a successful transport exchange.
    async fn materialize(&self, ctx: &mut ExecutionContext) -> anyhow::Result<Box<dyn Any + Send>>;
}

/// Render a scalar argument for a header, query pair, or path segment.
///
/// Strings render without quotes; everything else renders as its JSON
/// text. `None` means the value should not be written at all.
fn render_scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ============================================================================
// Stock parameter hooks
// ============================================================================

/// Writes the argument into a request header.
///
/// The header is named after the parameter unless overridden with
/// [`HeaderParam::named`]. Null/absent arguments write nothing.
pub struct HeaderParam {
    header: Option<String>,
}

impl HeaderParam {
    #[must_use]
    pub const fn new() -> Self {
        Self { header: None }
    }

    #[must_use]
    pub fn named(header: impl Into<String>) -> Self {
        Self {
            header: Some(header.into()),
        }
    }
}

impl Default for HeaderParam {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParameterHook for HeaderParam {
    fn name(&self) -> &str {
        "header"
    }

    async fn on_request(
        &self,
        ctx: &mut ExecutionContext,
        param: &ParameterDescriptor,
        value: &Value,
    ) -> anyhow::Result<()> {
        let Some(rendered) = render_scalar(value) else {
            return Ok(());
        };
        let name = self.header.as_deref().unwrap_or(param.name());
        let request = ctx
            .request_mut()
            .context("request has not been prepared")?;
        request.append_header(name, &rendered)?;
        Ok(())
    }
}

/// Appends the argument as a query pair, keyed by the parameter name
/// unless overridden.
pub struct QueryParam {
    key: Option<String>,
}

impl QueryParam {
    #[must_use]
    pub const fn new() -> Self {
        Self { key: None }
    }

    #[must_use]
    pub fn keyed(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
        }
    }
}

impl Default for QueryParam {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParameterHook for QueryParam {
    fn name(&self) -> &str {
        "query"
    }

    async fn on_request(
        &self,
        ctx: &mut ExecutionContext,
        param: &ParameterDescriptor,
        value: &Value,
    ) -> anyhow::Result<()> {
        let Some(rendered) = render_scalar(value) else {
            return Ok(());
        };
        let key = self.key.as_deref().unwrap_or(param.name()).to_string();
        let request = ctx
            .request_mut()
            .context("request has not been prepared")?;
        request.append_query(&key, &rendered);
        Ok(())
    }
}

/// Substitutes the argument into a `{name}` segment of the request path.
pub struct PathParam;

#[async_trait]
impl ParameterHook for PathParam {
    fn name(&self) -> &str {
        "path"
    }

    async fn on_request(
        &self,
        ctx: &mut ExecutionContext,
        param: &ParameterDescriptor,
        value: &Value,
    ) -> anyhow::Result<()> {
        let rendered = render_scalar(value)
            .with_context(|| format!("path parameter `{}` has no value", param.name()))?;
        let placeholder = format!("{{{}}}", param.name());
        let request = ctx
            .request_mut()
            .context("request has not been prepared")?;
        let path = request.url().path().to_string();
        if !path.contains(&placeholder) {
            anyhow::bail!("route has no `{placeholder}` segment");
        }
        let replaced = path.replace(&placeholder, &rendered);
        request.url_mut().set_path(&replaced);
        Ok(())
    }
}

/// Serializes the argument as the JSON request body.
pub struct JsonBodyParam;

#[async_trait]
impl ParameterHook for JsonBodyParam {
    fn name(&self) -> &str {
        "json-body"
    }

    async fn on_request(
        &self,
        ctx: &mut ExecutionContext,
        _param: &ParameterDescriptor,
        value: &Value,
    ) -> anyhow::Result<()> {
        let request = ctx
            .request_mut()
            .context("request has not been prepared")?;
        request.set_body(RequestBody::Json(value.clone()));
        Ok(())
    }
}

// ============================================================================
// Stock method hooks and filters
// ============================================================================

/// Inserts a fixed header into every request of the method.
pub struct StaticHeader {
    name: String,
    value: String,
}

impl StaticHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
impl RequestHook for StaticHeader {
    fn name(&self) -> &str {
        "static-header"
    }

    async fn on_request(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        let request = ctx
            .request_mut()
            .context("request has not been prepared")?;
        request.append_header(&self.name, &self.value)?;
        Ok(())
    }
}

/// Logs the begin and end of every dispatch through `tracing`.
pub struct TraceFilter;

#[async_trait]
impl Filter for TraceFilter {
    fn name(&self) -> &str {
        "trace"
    }

    async fn on_begin_request(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        if let Some(request) = ctx.request() {
            tracing::debug!(
                call_id = %ctx.call_id(),
                method = %request.method(),
                url = %request.url(),
                "Dispatching API call"
            );
        }
        Ok(())
    }

    async fn on_end_request(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        match ctx.outcome() {
            Some(DispatchOutcome::Value(_)) => {
                let status = ctx.response().map(|r| r.status().as_u16());
                tracing::debug!(call_id = %ctx.call_id(), status, "API call completed");
            }
            Some(DispatchOutcome::Failure(err)) => {
                tracing::warn!(call_id = %ctx.call_id(), error = %err, "API call failed");
            }
            None => {}
        }
        Ok(())
    }
}

// ============================================================================
// Stock return hooks
// ============================================================================

/// Materializes the response body as JSON into `T`.
///
/// Adds `Accept: application/json` during prepare when the request has no
/// Accept header yet. Non-success statuses fail materialization with the
/// status and a capped body excerpt.
pub struct JsonReturn<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonReturn<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonReturn<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn error_excerpt(response: &ApiResponse) -> String {
    let text = String::from_utf8_lossy(response.body());
    if text.len() > MAX_ERROR_BODY_CHARS {
        let mut end = MAX_ERROR_BODY_CHARS;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...(truncated)", &text[..end])
    } else {
        text.into_owned()
    }
}

#[async_trait]
impl<T: DeserializeOwned + Send + 'static> ReturnHook for JsonReturn<T> {
    fn name(&self) -> &str {
        "json"
    }

    fn produced_type(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    async fn on_request(&self, ctx: &mut ExecutionContext) -> anyhow::Result<()> {
        let request = ctx
            .request_mut()
            .context("request has not been prepared")?;
        if !request.headers().contains_key(http::header::ACCEPT) {
            request.append_header("accept", "application/json")?;
        }
        Ok(())
    }

    async fn materialize(&self, ctx: &mut ExecutionContext) -> anyhow::Result<Box<dyn Any + Send>> {
        let response = ctx.response().context("no response was stored")?;
        if !response.is_success() {
            anyhow::bail!(
                "API error {}: {}",
                response.status(),
                error_excerpt(response)
            );
        }
        let value: T = response.json().context("invalid JSON response body")?;
        Ok(Box::new(value))
    }
}

/// Materializes the response body as UTF-8 text.
pub struct TextReturn;

#[async_trait]
impl ReturnHook for TextReturn {
    fn name(&self) -> &str {
        "text"
    }

    fn produced_type(&self) -> &'static str {
        std::any::type_name::<String>()
    }

    async fn materialize(&self, ctx: &mut ExecutionContext) -> anyhow::Result<Box<dyn Any + Send>> {
        let response = ctx.response().context("no response was stored")?;
        if !response.is_success() {
            anyhow::bail!(
                "API error {}: {}",
                response.status(),
                error_excerpt(response)
            );
        }
        let text = response.text().context("response body is not UTF-8")?;
        Ok(Box::new(text.to_string()))
    }
}

/// Hands the raw [`ApiResponse`] back to the caller, any status included.
pub struct RawReturn;

#[async_trait]
impl ReturnHook for RawReturn {
    fn name(&self) -> &str {
        "raw"
    }

    fn produced_type(&self) -> &'static str {
        std::any::type_name::<ApiResponse>()
    }

    async fn materialize(&self, ctx: &mut ExecutionContext) -> anyhow::Result<Box<dyn Any + Send>> {
        let response = ctx.response().context("no response was stored")?.clone();
        Ok(Box::new(response))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        HeaderParam, JsonBodyParam, JsonReturn, ParameterHook, PathParam, QueryParam, RawReturn,
        RequestHook, ReturnHook, StaticHeader, TextReturn,
    };
    use crate::config::ClientConfig;
    use crate::context::ExecutionContext;
    use crate::descriptor::{MethodDescriptor, ParameterDescriptorBuilder};
    use courier_types::{ApiRequest, ApiResponse, RequestBody};
    use http::header::HeaderMap;
    use http::{Method, StatusCode};
    use serde_json::json;
    use std::sync::Arc;
    use url::Url;

    fn prepared_context(route: &str) -> ExecutionContext {
        let config = Arc::new(
            ClientConfig::builder("https://api.example.com/")
                .build()
                .unwrap(),
        );
        let method = Arc::new(MethodDescriptor::builder("test", Method::GET, route).build());
        let url = Url::parse("https://api.example.com/")
            .unwrap()
            .join(route)
            .unwrap();
        let mut ctx = ExecutionContext::new(config, method, Vec::new());
        ctx.set_request(ApiRequest::new(Method::GET, url));
        ctx
    }

    fn param(name: &str) -> crate::descriptor::ParameterDescriptor {
        ParameterDescriptorBuilder::new(name).build(0)
    }

    #[tokio::test]
    async fn header_param_uses_parameter_name_and_skips_null() {
        let mut ctx = prepared_context("users");
        let hook = HeaderParam::new();

        hook.on_request(&mut ctx, &param("x-tenant"), &json!("acme"))
            .await
            .unwrap();
        hook.on_request(&mut ctx, &param("x-skip"), &json!(null))
            .await
            .unwrap();

        let headers = ctx.request().unwrap().headers();
        assert_eq!(headers.get("x-tenant").unwrap(), "acme");
        assert!(!headers.contains_key("x-skip"));
    }

    #[tokio::test]
    async fn header_param_renders_numbers_without_quotes() {
        let mut ctx = prepared_context("users");
        HeaderParam::named("x-page")
            .on_request(&mut ctx, &param("page"), &json!(3))
            .await
            .unwrap();
        assert_eq!(ctx.request().unwrap().headers().get("x-page").unwrap(), "3");
    }

    #[tokio::test]
    async fn query_param_appends_pairs() {
        let mut ctx = prepared_context("search");
        QueryParam::new()
            .on_request(&mut ctx, &param("q"), &json!("rust"))
            .await
            .unwrap();
        QueryParam::keyed("p")
            .on_request(&mut ctx, &param("page"), &json!(2))
            .await
            .unwrap();
        assert_eq!(ctx.request().unwrap().url().query(), Some("q=rust&p=2"));
    }

    #[tokio::test]
    async fn path_param_substitutes_its_segment() {
        let mut ctx = prepared_context("users/{id}/posts");
        PathParam
            .on_request(&mut ctx, &param("id"), &json!(42))
            .await
            .unwrap();
        assert_eq!(ctx.request().unwrap().url().path(), "/users/42/posts");
    }

    #[tokio::test]
    async fn path_param_rejects_missing_placeholder() {
        let mut ctx = prepared_context("users");
        let result = PathParam.on_request(&mut ctx, &param("id"), &json!(42)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn json_body_param_sets_the_body() {
        let mut ctx = prepared_context("users");
        JsonBodyParam
            .on_request(&mut ctx, &param("user"), &json!({"name": "ada"}))
            .await
            .unwrap();
        assert_eq!(
            ctx.request().unwrap().body(),
            Some(&RequestBody::Json(json!({"name": "ada"})))
        );
    }

    #[tokio::test]
    async fn json_return_sets_accept_only_when_absent() {
        let hook = JsonReturn::<i64>::new();

        let mut ctx = prepared_context("users");
        hook.on_request(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.request().unwrap().headers().get("accept").unwrap(),
            "application/json"
        );

        let mut ctx = prepared_context("users");
        ctx.request_mut()
            .unwrap()
            .append_header("accept", "text/csv")
            .unwrap();
        hook.on_request(&mut ctx).await.unwrap();
        let values: Vec<_> = ctx
            .request()
            .unwrap()
            .headers()
            .get_all("accept")
            .iter()
            .collect();
        assert_eq!(values.len(), 1);
    }

    #[tokio::test]
    async fn json_return_materializes_success_bodies() {
        let mut ctx = prepared_context("users");
        ctx.set_response(ApiResponse::new(StatusCode::OK, HeaderMap::new(), &b"42"[..]));

        let value = JsonReturn::<i64>::new().materialize(&mut ctx).await.unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&42));
    }

    #[tokio::test]
    async fn static_header_inserts_its_fixed_value() {
        let mut ctx = prepared_context("users");
        StaticHeader::new("x-api-version", "2024-06-01")
            .on_request(&mut ctx)
            .await
            .unwrap();
        assert_eq!(
            ctx.request().unwrap().headers().get("x-api-version").unwrap(),
            "2024-06-01"
        );
    }

    #[tokio::test]
    async fn text_return_materializes_the_body_as_string() {
        let mut ctx = prepared_context("users");
        ctx.set_response(ApiResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            &b"pong"[..],
        ));

        let value = TextReturn.materialize(&mut ctx).await.unwrap();
        assert_eq!(
            value.downcast_ref::<String>().map(String::as_str),
            Some("pong")
        );
    }

    #[tokio::test]
    async fn raw_return_passes_error_statuses_through() {
        let mut ctx = prepared_context("users");
        ctx.set_response(ApiResponse::new(
            StatusCode::IM_A_TEAPOT,
            HeaderMap::new(),
            &b"short and stout"[..],
        ));

        let value = RawReturn.materialize(&mut ctx).await.unwrap();
        let response = value.downcast_ref::<ApiResponse>().unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn json_return_fails_on_error_status() {
        let mut ctx = prepared_context("users");
        ctx.set_response(ApiResponse::new(
            StatusCode::NOT_FOUND,
            HeaderMap::new(),
            &b"missing"[..],
        ));

        let err = JsonReturn::<i64>::new()
            .materialize(&mut ctx)
            .await
            .unwrap_err();
        let message = format!("{err}");
        assert!(message.contains("404"), "got: {message}");
        assert!(message.contains("missing"), "got: {message}");
    }
}
