//! Agent service: builds the engine from configuration and runs it.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use tracing::{info, warn};

use autolight_core::capture::SourceKind;
use autolight_core::{AutolightError, ColorEngine, EngineStatus};

use crate::config::AgentConfig;

// ── AgentService ─────────────────────────────────────────────────

/// The top-level agent service.
///
/// Owns the [`ColorEngine`] and exposes its stop flag so a signal
/// handler can end the run loop.
pub struct AgentService {
    engine: ColorEngine,
}

impl AgentService {
    /// Build the engine and its platform capture backend from `config`.
    pub fn new(config: &AgentConfig) -> Self {
        Self::with_engine(ColorEngine::from_config(config.to_engine_config()), config)
    }

    /// Wrap an already-built engine, applying the configured region.
    pub fn with_engine(mut engine: ColorEngine, config: &AgentConfig) -> Self {
        if engine.source_kind() == SourceKind::SharedTexture {
            info!("shared-texture source: capture region is ignored");
        } else if config.capture.region.is_empty() {
            warn!("capture region is empty; every capture will be skipped");
        }
        engine.set_region(config.capture.region);
        Self { engine }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.engine.stop_handle()
    }

    pub fn engine(&self) -> &ColorEngine {
        &self.engine
    }

    /// Run until stopped.
    pub async fn run(&mut self) -> Result<(), AutolightError> {
        self.engine.run().await?;
        if self.engine.status() == EngineStatus::SourceLost {
            warn!("stopped with the capture source lost");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use autolight_core::capture::{CaptureRegion, CaptureSource, PixelBuffer};

    use super::*;

    struct Blank;

    impl CaptureSource for Blank {
        fn capture(&mut self, _region: &CaptureRegion) -> PixelBuffer {
            PixelBuffer::invalid()
        }

        fn reinitialize(&mut self) -> bool {
            false
        }

        fn is_healthy(&mut self) -> bool {
            false
        }

        fn kind(&self) -> SourceKind {
            SourceKind::Blit
        }
    }

    #[test]
    fn region_comes_from_config() {
        let mut config = AgentConfig::default();
        config.capture.region = CaptureRegion::new(10, 20, 110, 220);
        let engine = ColorEngine::new(config.to_engine_config(), Box::new(Blank));
        let svc = AgentService::with_engine(engine, &config);
        assert_eq!(svc.engine().region(), CaptureRegion::new(10, 20, 110, 220));
        assert_eq!(svc.engine().config().capture_fps, 5.0);
    }

    #[tokio::test]
    async fn run_returns_when_stopped() {
        let config = AgentConfig::default();
        let engine = ColorEngine::new(config.to_engine_config(), Box::new(Blank));
        let mut svc = AgentService::with_engine(engine, &config);
        let stop = svc.stop_handle();

        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            stop.store(false, std::sync::atomic::Ordering::SeqCst);
        });

        tokio::time::timeout(std::time::Duration::from_secs(5), svc.run())
            .await
            .expect("service did not stop")
            .expect("service failed");
    }
}
