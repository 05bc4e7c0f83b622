//! The process-wide engine mutex and named-engine registry (spec §4.4,
//! §4.5, §6 `/api/models/{engine}`). Grounded on
//! `original_source/src/constants.py`'s `BATCH_WORKERS_MAX = 1` comment
//! ("TranscriptionEngine is not thread-safe, must never parallelize"),
//! which is the reason this is a single mutex rather than a pool, and
//! `original_source/src/api/routers/models.py`'s two fixed engine names.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::collaborators::TranscriptionEngine;
use crate::errors::AppError;

/// The only two engine names the surface recognizes (spec §6).
pub const ENGINE_NAMES: &[&str] = &["kotoba", "faster-whisper"];

pub fn is_known_engine(name: &str) -> bool {
    ENGINE_NAMES.contains(&name)
}

struct Slot {
    name: Option<String>,
    engine: Option<Arc<dyn TranscriptionEngine>>,
}

/// A factory constructing the collaborator for a given engine name. The
/// default production factory has nothing to construct (the real engine
/// libraries are an external collaborator, spec §1) and reports
/// [`kotoba_core::ErrorCategory::Unsupported`]; tests substitute a
/// factory returning [`crate::collaborators::FakeTranscriptionEngine`].
pub type EngineFactory = Box<dyn Fn(&str) -> Result<Arc<dyn TranscriptionEngine>, AppError> + Send + Sync>;

/// Serializes every call into the active engine behind a single
/// `parking_lot::Mutex`, matching spec §4.5's `try_acquire(timeout=1s)`
/// contract: callers that can't acquire within the configured window get
/// a `Busy` (409), never block indefinitely.
pub struct EngineRegistry {
    slot: Mutex<Slot>,
    factory: EngineFactory,
}

impl EngineRegistry {
    pub fn new(factory: EngineFactory) -> Self {
        Self {
            slot: Mutex::new(Slot { name: None, engine: None }),
            factory,
        }
    }

    pub fn production() -> Self {
        Self::new(Box::new(|name| {
            Err(AppError::unsupported()
                .with_detail(format!("engine collaborator not installed: {name}")))
        }))
    }

    /// Loads (constructing via the factory if necessary) the named
    /// engine and runs `f` with exclusive access. Returns `Busy` if the
    /// mutex can't be acquired within `timeout`.
    pub fn with_engine<T>(
        &self,
        name: &str,
        timeout: Duration,
        f: impl FnOnce(&dyn TranscriptionEngine) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut guard = self
            .slot
            .try_lock_for(timeout)
            .ok_or_else(AppError::busy)?;

        if guard.name.as_deref() != Some(name) || guard.engine.is_none() {
            let engine = (self.factory)(name)?;
            guard.engine = Some(engine);
            guard.name = Some(name.to_string());
        }

        let engine = guard.engine.as_ref().unwrap();
        if !engine.is_loaded() {
            engine.load_model()?;
        }
        f(engine.as_ref())
    }

    pub fn unload(&self, name: &str, timeout: Duration) -> Result<(), AppError> {
        let mut guard = self.slot.try_lock_for(timeout).ok_or_else(AppError::busy)?;
        if guard.name.as_deref() == Some(name) {
            if let Some(engine) = guard.engine.take() {
                engine.unload_model();
            }
            guard.name = None;
        }
        Ok(())
    }

    pub fn info(&self, name: &str, timeout: Duration) -> Result<bool, AppError> {
        let guard = self.slot.try_lock_for(timeout).ok_or_else(AppError::busy)?;
        Ok(guard.name.as_deref() == Some(name) && guard.engine.as_ref().is_some_and(|e| e.is_loaded()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::FakeTranscriptionEngine;

    fn fake_registry() -> EngineRegistry {
        EngineRegistry::new(Box::new(|_name| {
            Ok(Arc::new(FakeTranscriptionEngine::default()) as Arc<dyn TranscriptionEngine>)
        }))
    }

    #[test]
    fn production_registry_reports_unsupported() {
        let registry = EngineRegistry::production();
        let result = registry.with_engine("kotoba", Duration::from_millis(100), |_| Ok(()));
        assert!(result.is_err());
    }

    #[test]
    fn with_engine_lazily_loads_and_reuses() {
        let registry = fake_registry();
        let loaded_before = registry.info("kotoba", Duration::from_millis(100)).unwrap();
        assert!(!loaded_before);
        registry
            .with_engine("kotoba", Duration::from_millis(100), |engine| {
                assert!(engine.is_loaded());
                Ok(())
            })
            .unwrap();
        assert!(registry.info("kotoba", Duration::from_millis(100)).unwrap());
    }

    #[test]
    fn switching_engine_name_reloads() {
        let registry = fake_registry();
        registry
            .with_engine("kotoba", Duration::from_millis(100), |_| Ok(()))
            .unwrap();
        registry
            .with_engine("faster-whisper", Duration::from_millis(100), |engine| {
                assert!(engine.is_loaded());
                Ok(())
            })
            .unwrap();
        assert!(!registry.info("kotoba", Duration::from_millis(100)).unwrap());
    }
}
