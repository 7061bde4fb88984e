//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn operations. The daemon (or an
//! embedding application) installs its own `metrics` recorder; without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: provider name (e.g. "openai", "gemini")
//! - `operation`: capability invoked ("complete", "stream", "embed")
//! - `status`: outcome, "ok" or "error"
//! - `model_type`: request class ("primary", "code", "embeddings")

/// Total adapter calls dispatched by the router.
///
/// Labels: `provider`, `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "muninn_requests_total";

/// Adapter call duration in seconds.
///
/// Labels: `provider`, `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "muninn_request_duration_seconds";

/// Times the router moved on to the next provider after a failure.
///
/// Labels: `from`, `model_type`.
pub const FALLBACKS_TOTAL: &str = "muninn_fallbacks_total";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `provider`, `operation`.
pub const RETRIES_TOTAL: &str = "muninn_retries_total";

/// Total tokens reported by providers.
///
/// Labels: `provider`.
pub const TOKENS_TOTAL: &str = "muninn_tokens_total";

/// Labels: `operation` ("completion" | "embed").
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Labels: `operation` ("completion" | "embed").
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Entries evicted from the response cache to make room.
///
/// Labels: `operation`.
pub const CACHE_EVICTIONS_TOTAL: &str = "muninn_cache_evictions_total";
