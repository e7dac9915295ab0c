//! Process-wide client configuration.

use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::hooks::Filter;
use crate::transport::{HttpTransport, Transport};

/// Shared, read-only configuration for every call made through a client.
///
/// Built once at startup and handed to each [`ExecutionContext`] as an
/// `Arc`. The global filter list is an immutable snapshot: a call iterates
/// the snapshot its config instance carries, so registration changes made
/// by building a new config can never affect a call already in flight.
///
/// [`ExecutionContext`]: crate::ExecutionContext
pub struct ClientConfig {
    base_url: Url,
    transport: Arc<dyn Transport>,
    validate_parameters: bool,
    global_filters: Arc<[Arc<dyn Filter>]>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL `{url}`: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("base URL `{0}` cannot serve as a base for routes")]
    CannotBeABase(String),
}

impl ClientConfig {
    /// Start building a config rooted at the given base URL.
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            base_url: base_url.into(),
            transport: None,
            validate_parameters: true,
            global_filters: Vec::new(),
        }
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Whether the prepare phase runs the parameter validator.
    #[must_use]
    pub const fn validate_parameters(&self) -> bool {
        self.validate_parameters
    }

    /// Globally registered filters, in registration order.
    #[must_use]
    pub fn global_filters(&self) -> &[Arc<dyn Filter>] {
        &self.global_filters
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("validate_parameters", &self.validate_parameters)
            .field("global_filters", &self.global_filters.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ClientConfig`].
pub struct ClientConfigBuilder {
    base_url: String,
    transport: Option<Arc<dyn Transport>>,
    validate_parameters: bool,
    global_filters: Vec<Arc<dyn Filter>>,
}

impl ClientConfigBuilder {
    /// Replace the default reqwest-backed transport.
    #[must_use]
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Toggle parameter validation for every call. Defaults to on.
    #[must_use]
    pub fn validate_parameters(mut self, validate: bool) -> Self {
        self.validate_parameters = validate;
        self
    }

    /// Append a global filter; filters run in registration order.
    #[must_use]
    pub fn global_filter<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.global_filters.push(Arc::new(filter));
        self
    }

    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let base_url = Url::parse(&self.base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            source,
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::CannotBeABase(self.base_url));
        }
        Ok(ClientConfig {
            base_url,
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(HttpTransport::new())),
            validate_parameters: self.validate_parameters,
            global_filters: self.global_filters.into(),
        })
    }
}
