//! Error types for the sibyl core.
//!
//! Each error variant carries a stable error code (SCREAMING_SNAKE_CASE)
//! that is included in the Display output and accessible via
//! [`SibylError::code()`]. Codes are part of the public API contract and
//! will not change.

/// Errors produced at the core boundary.
///
/// Each variant includes a stable error code accessible via [`SibylError::code()`].
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, thiserror::Error)]
pub enum SibylError {
    /// The LLM provider could not be reached (network error or 5xx).
    #[error("[PROVIDER_UNAVAILABLE] {0}")]
    ProviderUnavailable(String),

    /// The LLM provider rejected the request with a rate limit (429).
    #[error("[RATE_LIMITED] {0}")]
    RateLimited(String),

    /// The provider returned a payload the adaptor could not parse.
    #[error("[INVALID_RESPONSE] {0}")]
    InvalidResponse(String),

    /// The prompt exceeded the provider's context window.
    #[error("[CONTEXT_OVERFLOW] {0}")]
    ContextOverflow(String),

    /// A tool call named a tool that is not registered.
    #[error("[UNKNOWN_TOOL] {0}")]
    UnknownTool(String),

    /// Tool arguments failed to parse or validate against the schema.
    #[error("[INVALID_ARGUMENTS] {0}")]
    InvalidArguments(String),

    /// Tool execution failed.
    #[error("[TOOL_FAILED] {0}")]
    ToolFailed(String),

    /// A loop step's source variable was absent or not a list.
    #[error("[LOOP_SOURCE_MISSING] {0}")]
    LoopSourceMissing(String),

    /// A prompt template referenced a placeholder with no value.
    #[error("[TEMPLATE_VAR_MISSING] {0}")]
    TemplateVar(String),

    /// Invalid or missing configuration.
    #[error("[CONFIG_INVALID] {0}")]
    Config(String),

    /// The operation was cancelled cooperatively. Not an error to users.
    #[error("[CANCELLED] operation cancelled")]
    Cancelled,
}

impl SibylError {
    /// Returns the stable error code for this error.
    ///
    /// Use these for programmatic error handling rather than parsing
    /// Display output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::InvalidResponse(_) => "INVALID_RESPONSE",
            Self::ContextOverflow(_) => "CONTEXT_OVERFLOW",
            Self::UnknownTool(_) => "UNKNOWN_TOOL",
            Self::InvalidArguments(_) => "INVALID_ARGUMENTS",
            Self::ToolFailed(_) => "TOOL_FAILED",
            Self::LoopSourceMissing(_) => "LOOP_SOURCE_MISSING",
            Self::TemplateVar(_) => "TEMPLATE_VAR_MISSING",
            Self::Config(_) => "CONFIG_INVALID",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns the inner message without the code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::ProviderUnavailable(m)
            | Self::RateLimited(m)
            | Self::InvalidResponse(m)
            | Self::ContextOverflow(m)
            | Self::UnknownTool(m)
            | Self::InvalidArguments(m)
            | Self::ToolFailed(m)
            | Self::LoopSourceMissing(m)
            | Self::TemplateVar(m)
            | Self::Config(m) => m,
            Self::Cancelled => "operation cancelled",
        }
    }

    /// Whether a caller may reasonably retry the failed operation.
    ///
    /// Only transient provider conditions qualify. The core itself never
    /// retries; callers decide.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_) | Self::RateLimited(_))
    }

    /// True for provider-side failures (the first four taxonomy kinds).
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_)
                | Self::RateLimited(_)
                | Self::InvalidResponse(_)
                | Self::ContextOverflow(_)
        )
    }
}

/// Convenience alias for sibyl results.
pub type Result<T> = std::result::Result<T, SibylError>;
