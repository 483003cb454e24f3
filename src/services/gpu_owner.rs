//! A4 — GPU model owner: process-wide singleton gating which model currently
//! holds the GPU (spec §5 "Resource acquisition"). Transitions unload the
//! previous owner and wait a settling delay before the next acquires.
//! Acquired by `LlmEnricher::invoke` before every backend call.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuOwner {
    OllamaLlm,
    OllamaVision,
    LocalImageGenerator,
    None,
}

impl GpuOwner {
    fn label(&self) -> &'static str {
        match self {
            GpuOwner::OllamaLlm => "ollama-llm",
            GpuOwner::OllamaVision => "ollama-vision",
            GpuOwner::LocalImageGenerator => "local-image-generator",
            GpuOwner::None => "none",
        }
    }
}

struct State {
    owner: GpuOwner,
}

/// Guards the singleton owner with a mutex for lazy transitions; once a
/// transition completes, callers reading `current()` don't contend on it
/// (spec §5 "Shared resources": lock-free reads after init).
pub struct GpuModelOwner {
    state: Mutex<State>,
    settling_delay: Duration,
}

impl GpuModelOwner {
    pub fn new(settling_delay: Duration) -> Arc<Self> {
        Arc::new(Self { state: Mutex::new(State { owner: GpuOwner::None }), settling_delay })
    }

    pub async fn current(&self) -> GpuOwner {
        self.state.lock().await.owner
    }

    /// Acquires the GPU for `owner`, unloading the previous owner first and
    /// waiting `settling_delay` if a transition actually occurred. A request
    /// for the already-current owner is a no-op.
    pub async fn acquire(&self, owner: GpuOwner) {
        let mut state = self.state.lock().await;
        if state.owner == owner {
            return;
        }
        let previous = state.owner;
        tracing::info!(from = previous.label(), to = owner.label(), "gpu owner transition");
        state.owner = owner;
        drop(state);

        if previous != GpuOwner::None {
            tokio::time::sleep(self.settling_delay).await;
        }
    }

    pub async fn release(&self, owner: GpuOwner) {
        let mut state = self.state.lock().await;
        if state.owner == owner {
            state.owner = GpuOwner::None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_is_noop_for_current_owner() {
        let gpu = GpuModelOwner::new(Duration::from_millis(1));
        gpu.acquire(GpuOwner::OllamaLlm).await;
        assert_eq!(gpu.current().await, GpuOwner::OllamaLlm);
        gpu.acquire(GpuOwner::OllamaLlm).await;
        assert_eq!(gpu.current().await, GpuOwner::OllamaLlm);
    }

    #[tokio::test]
    async fn release_only_clears_matching_owner() {
        let gpu = GpuModelOwner::new(Duration::from_millis(1));
        gpu.acquire(GpuOwner::OllamaVision).await;
        gpu.release(GpuOwner::OllamaLlm).await;
        assert_eq!(gpu.current().await, GpuOwner::OllamaVision);
        gpu.release(GpuOwner::OllamaVision).await;
        assert_eq!(gpu.current().await, GpuOwner::None);
    }
}
