//! Liveness probing for external dependencies.

use async_trait::async_trait;

/// Something that can be asked "are you up?".
///
/// Probes are used by diagnostics only; they never gate the message path.
/// Implementations return `false` for any non-success answer and leave
/// timeouts to the caller.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Name shown in status output (e.g. "ollama").
    fn probe_name(&self) -> &str;

    /// One liveness request.
    async fn is_up(&self) -> bool;
}
