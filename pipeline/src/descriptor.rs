//! Immutable per-method metadata.
//!
//! Descriptors are built once per API method signature - by the proxy layer
//! in a full deployment, by hand in tests - and shared across calls behind
//! an `Arc`. Hook lists are typed and ordered; the order they were declared
//! in is the order the pipeline runs them in.

use std::sync::Arc;

use http::Method;

use crate::hooks::{Filter, JsonReturn, ParameterHook, RequestHook, ReturnHook};
use crate::validation::{Constraint, PropertyConstraint};

/// Metadata for one API method parameter.
pub struct ParameterDescriptor {
    name: String,
    index: usize,
    hooks: Vec<Arc<dyn ParameterHook>>,
    constraints: Vec<Constraint>,
    property_constraints: Vec<PropertyConstraint>,
}

impl ParameterDescriptor {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in the method's declared parameter order; also the index of
    /// the matching argument on the execution context.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn hooks(&self) -> &[Arc<dyn ParameterHook>] {
        &self.hooks
    }

    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    #[must_use]
    pub fn property_constraints(&self) -> &[PropertyConstraint] {
        &self.property_constraints
    }
}

impl std::fmt::Debug for ParameterDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterDescriptor")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("hooks", &self.hooks.len())
            .field("constraints", &self.constraints)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ParameterDescriptor`].
pub struct ParameterDescriptorBuilder {
    name: String,
    hooks: Vec<Arc<dyn ParameterHook>>,
    constraints: Vec<Constraint>,
    property_constraints: Vec<PropertyConstraint>,
}

impl ParameterDescriptorBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: Vec::new(),
            constraints: Vec::new(),
            property_constraints: Vec::new(),
        }
    }

    #[must_use]
    pub fn hook<H: ParameterHook + 'static>(mut self, hook: H) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    #[must_use]
    pub fn property_constraint(mut self, constraint: PropertyConstraint) -> Self {
        self.property_constraints.push(constraint);
        self
    }

    /// Finish the descriptor at the given position in the parameter list.
    ///
    /// [`MethodDescriptorBuilder::parameter`] assigns positions in
    /// declaration order; call this directly only when building a
    /// standalone descriptor.
    #[must_use]
    pub fn build(self, index: usize) -> ParameterDescriptor {
        ParameterDescriptor {
            name: self.name,
            index,
            hooks: self.hooks,
            constraints: self.constraints,
            property_constraints: self.property_constraints,
        }
    }
}

/// Metadata for one API method.
///
/// Immutable once built; the pipeline never mutates a descriptor, and
/// concurrent calls share one instance freely.
pub struct MethodDescriptor {
    name: String,
    method: Method,
    route: String,
    parameters: Vec<ParameterDescriptor>,
    request_hooks: Vec<Arc<dyn RequestHook>>,
    filters: Vec<Arc<dyn Filter>>,
    return_hook: Arc<dyn ReturnHook>,
}

impl MethodDescriptor {
    /// Start building a descriptor.
    ///
    /// `route` is joined onto the config's base URL at prepare time, with
    /// the semantics of [`url::Url::join`]: relative routes extend a base
    /// path ending in `/`, absolute routes replace it.
    pub fn builder(
        name: impl Into<String>,
        method: Method,
        route: impl Into<String>,
    ) -> MethodDescriptorBuilder {
        MethodDescriptorBuilder {
            name: name.into(),
            method,
            route: route.into(),
            parameters: Vec::new(),
            request_hooks: Vec::new(),
            filters: Vec::new(),
            return_hook: None,
        }
    }

    /// Diagnostic name, e.g. `get_user`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn http_method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Parameters in declared order.
    #[must_use]
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// Method-level request-building hooks in declared order.
    #[must_use]
    pub fn request_hooks(&self) -> &[Arc<dyn RequestHook>] {
        &self.request_hooks
    }

    /// Method-level begin/end interceptors in declared order.
    #[must_use]
    pub fn filters(&self) -> &[Arc<dyn Filter>] {
        &self.filters
    }

    #[must_use]
    pub fn return_hook(&self) -> Arc<dyn ReturnHook> {
        Arc::clone(&self.return_hook)
    }
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("route", &self.route)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Builder for [`MethodDescriptor`].
pub struct MethodDescriptorBuilder {
    name: String,
    method: Method,
    route: String,
    parameters: Vec<ParameterDescriptor>,
    request_hooks: Vec<Arc<dyn RequestHook>>,
    filters: Vec<Arc<dyn Filter>>,
    return_hook: Option<Arc<dyn ReturnHook>>,
}

impl MethodDescriptorBuilder {
    /// Add a parameter; positions are assigned in declaration order.
    #[must_use]
    pub fn parameter(mut self, parameter: ParameterDescriptorBuilder) -> Self {
        let index = self.parameters.len();
        self.parameters.push(parameter.build(index));
        self
    }

    #[must_use]
    pub fn request_hook<H: RequestHook + 'static>(mut self, hook: H) -> Self {
        self.request_hooks.push(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn filter<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    /// Set the return-handling hook. Defaults to JSON materialization of
    /// [`serde_json::Value`] when never called.
    #[must_use]
    pub fn returning<R: ReturnHook + 'static>(mut self, hook: R) -> Self {
        self.return_hook = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn build(self) -> MethodDescriptor {
        MethodDescriptor {
            name: self.name,
            method: self.method,
            route: self.route,
            parameters: self.parameters,
            request_hooks: self.request_hooks,
            filters: self.filters,
            return_hook: self
                .return_hook
                .unwrap_or_else(|| Arc::new(JsonReturn::<serde_json::Value>::new())),
        }
    }
}
