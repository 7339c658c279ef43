//! Auth error taxonomy.
//!
//! ERROR HANDLING
//! ==============
//! Only `ConfigurationMissing` may halt startup. Every other variant is
//! recovered by the component that sees it: session fetch failures degrade to
//! "signed out", profile upsert failures are logged and dropped.

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

/// Errors produced by the session lifecycle and its provider clients.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A required configuration value is absent. Fatal at startup.
    #[error("missing configuration: none of {vars} is set")]
    ConfigurationMissing { vars: String },

    /// A configuration value is present but could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The identity provider could not return the current session.
    #[error("session fetch failed: {0}")]
    SessionFetch(String),

    /// An auth event did not match any known event name.
    #[error("malformed auth event: {0}")]
    MalformedEvent(String),

    /// The profile store rejected or never received an upsert.
    #[error("profile upsert failed: {0}")]
    ProfileUpsert(String),

    /// The HTTP request to the provider failed before a response arrived.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The provider returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The provider response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The provider reported an OAuth error on the redirect URL.
    #[error("provider error: {code}: {description}")]
    Provider { code: String, description: String },

    /// The redirect URL carried neither tokens nor an authorization code.
    #[error("callback URL carries no authorization artifacts")]
    MissingCallbackArtifacts,
}

impl AuthError {
    /// Stable machine-readable code for logs.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigurationMissing { .. } => "E_CONFIGURATION_MISSING",
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::SessionFetch(_) => "E_SESSION_FETCH",
            Self::MalformedEvent(_) => "E_MALFORMED_EVENT",
            Self::ProfileUpsert(_) => "E_PROFILE_UPSERT",
            Self::ApiRequest(_) => "E_API_REQUEST",
            Self::ApiResponse { .. } => "E_API_RESPONSE",
            Self::ApiParse(_) => "E_API_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Provider { .. } => "E_PROVIDER",
            Self::MissingCallbackArtifacts => "E_MISSING_CALLBACK_ARTIFACTS",
        }
    }

    /// Whether this error must stop the application from initializing.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigurationMissing { .. } | Self::ConfigParse(_) | Self::HttpClientBuild(_))
    }
}
