use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Environment variable selecting the [`StridePolicy`] used by buffer imports.
pub const STRIDE_POLICY_ENV: &str = "SPIRAL_BUFFER_STRIDES";
/// Environment variable toggling `trace`-level lifecycle logging.
pub const TRACE_LIFECYCLE_ENV: &str = "SPIRAL_TRACE_LIFECYCLE";

/// How a buffer import treats descriptors whose strides are not contiguous row-major.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StridePolicy {
    /// Only contiguous row-major buffers are accepted; anything else is rejected.
    #[default]
    Contiguous,
    /// Arbitrary byte strides are honoured by copying element by element.
    Strided,
}

impl StridePolicy {
    pub fn label(self) -> &'static str {
        match self {
            StridePolicy::Contiguous => "contiguous",
            StridePolicy::Strided => "strided",
        }
    }
}

impl fmt::Display for StridePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StridePolicy {
    type Err = ParsePolicyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "contiguous" | "c" | "strict" => Ok(StridePolicy::Contiguous),
            "strided" | "translate" | "any" => Ok(StridePolicy::Strided),
            _ => Err(ParsePolicyError {
                value: raw.to_string(),
            }),
        }
    }
}

/// Returned when a stride policy label is not recognised.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown stride policy '{value}' (expected 'contiguous' or 'strided')")]
pub struct ParsePolicyError {
    pub value: String,
}

/// Process-wide interop settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InteropConfig {
    /// Policy applied by imports that do not pass one explicitly.
    pub stride_policy: StridePolicy,
    /// Whether matrix lifecycle events are logged at `trace` level.
    pub trace_lifecycle: bool,
}

impl InteropConfig {
    /// Builds a configuration snapshot from environment variables.
    fn from_env() -> Self {
        let stride_policy = match std::env::var(STRIDE_POLICY_ENV) {
            Ok(raw) => raw.parse::<StridePolicy>().unwrap_or_else(|err| {
                ::tracing::warn!(
                    "{err}; falling back to '{}'",
                    StridePolicy::default().label()
                );
                StridePolicy::default()
            }),
            Err(_) => StridePolicy::default(),
        };

        let trace_lifecycle = std::env::var(TRACE_LIFECYCLE_ENV)
            .ok()
            .map(|v| matches!(v.trim(), "1" | "true" | "True" | "on" | "ON" | "yes"))
            .unwrap_or(false);

        Self {
            stride_policy,
            trace_lifecycle,
        }
    }
}

static CONFIG: OnceLock<InteropConfig> = OnceLock::new();

/// Returns the lazily initialised interop configuration.
pub fn config() -> &'static InteropConfig {
    CONFIG.get_or_init(InteropConfig::from_env)
}

/// Returned by [`configure`] when the snapshot was already resolved.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("interop configuration already resolved ({active:?}); configure must run before the first matrix is created")]
pub struct AlreadyConfigured {
    /// The snapshot that stays in effect.
    pub active: InteropConfig,
}

/// Installs an explicit configuration.
///
/// Every matrix lifecycle event reads [`config`], so this must run before the
/// first matrix is created. Afterwards the snapshot is frozen and the
/// override is handed back inside [`AlreadyConfigured`].
pub fn configure(cfg: InteropConfig) -> Result<&'static InteropConfig, AlreadyConfigured> {
    let mut pending = Some(cfg);
    let active = CONFIG.get_or_init(|| pending.take().unwrap_or_default());
    match pending {
        None => Ok(active),
        Some(_) => Err(AlreadyConfigured {
            active: active.clone(),
        }),
    }
}

/// Stride policy applied by default imports.
pub fn stride_policy() -> StridePolicy {
    config().stride_policy
}

/// Returns whether lifecycle events should be logged.
pub fn trace_lifecycle() -> bool {
    config().trace_lifecycle
}
