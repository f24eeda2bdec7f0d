//! Coordinator configuration.

use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default cache lifetime for completed GET responses.
const DEFAULT_CACHE_LIFETIME: Duration = Duration::from_secs(10 * 60);
/// Default query parameter marking a request as a fragment request.
const DEFAULT_IDENTIFIER_PARAM: &str = "frag";
/// Default response header consulted for multipart detection.
const DEFAULT_MULTIPART_HEADER: &str = "x-response-type";

/// Errors produced when building a [`CoordinatorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No base URL was provided.
    #[error("a base url is required")]
    MissingBase,
    /// The base URL did not parse or cannot serve as a join base.
    #[error("invalid base url {url:?}")]
    InvalidBase {
        url: String,
        #[source]
        source: Option<url::ParseError>,
    },
    /// The identifier parameter was empty.
    #[error("identifier parameter must not be empty")]
    EmptyIdentifierParam,
}

/// Validated configuration for a [`RequestCoordinator`](super::RequestCoordinator).
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    base: Url,
    identifier_param: String,
    multipart_header: String,
    cache_lifetime: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl CoordinatorConfig {
    /// Begin building a configuration.
    #[must_use]
    pub fn builder() -> CoordinatorConfigBuilder { CoordinatorConfigBuilder::default() }

    /// Base URL request destinations are resolved against.
    #[must_use]
    pub fn base(&self) -> &Url { &self.base }

    /// Query parameter appended to transport URLs, carrying the request
    /// type identifier.
    #[must_use]
    pub fn identifier_param(&self) -> &str { &self.identifier_param }

    /// Response header consulted for multipart framing detection.
    #[must_use]
    pub fn multipart_header(&self) -> &str { &self.multipart_header }

    /// Lifetime of cached GET responses; `None` caches forever.
    #[must_use]
    pub fn cache_lifetime(&self) -> Option<Duration> { self.cache_lifetime }

    /// Overall transport deadline, when configured.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> { self.request_timeout }
}

/// Builder for [`CoordinatorConfig`].
#[derive(Debug)]
pub struct CoordinatorConfigBuilder {
    base: Option<String>,
    identifier_param: String,
    multipart_header: String,
    cache_lifetime: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl Default for CoordinatorConfigBuilder {
    fn default() -> Self {
        Self {
            base: None,
            identifier_param: DEFAULT_IDENTIFIER_PARAM.to_owned(),
            multipart_header: DEFAULT_MULTIPART_HEADER.to_owned(),
            cache_lifetime: Some(DEFAULT_CACHE_LIFETIME),
            request_timeout: None,
        }
    }
}

impl CoordinatorConfigBuilder {
    /// Set the base URL destinations are resolved against. Required.
    #[must_use]
    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Override the identifier query parameter name.
    #[must_use]
    pub fn identifier_param(mut self, param: impl Into<String>) -> Self {
        self.identifier_param = param.into();
        self
    }

    /// Override the multipart detection header name.
    #[must_use]
    pub fn multipart_header(mut self, header: impl Into<String>) -> Self {
        self.multipart_header = header.into();
        self
    }

    /// Set the cached-response lifetime; `None` caches forever.
    #[must_use]
    pub fn cache_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.cache_lifetime = lifetime;
        self
    }

    /// Set the overall transport deadline.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingBase`] when no base was set,
    /// [`ConfigError::InvalidBase`] when it does not parse or cannot serve
    /// as a join base, and [`ConfigError::EmptyIdentifierParam`] when the
    /// identifier parameter is blank.
    pub fn build(self) -> Result<CoordinatorConfig, ConfigError> {
        let raw = self.base.ok_or(ConfigError::MissingBase)?;
        let base = Url::parse(&raw).map_err(|source| ConfigError::InvalidBase {
            url: raw.clone(),
            source: Some(source),
        })?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::InvalidBase {
                url: raw,
                source: None,
            });
        }
        if self.identifier_param.is_empty() {
            return Err(ConfigError::EmptyIdentifierParam);
        }
        Ok(CoordinatorConfig {
            base,
            identifier_param: self.identifier_param,
            multipart_header: self.multipart_header,
            cache_lifetime: self.cache_lifetime,
            request_timeout: self.request_timeout,
        })
    }
}
