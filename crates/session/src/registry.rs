//! Singleton capture sources, one per kind.
//!
//! A session owns at most one display, webcam, microphone, and desktop
//! audio source. Scene items reference sources through this registry,
//! so rebuilding scenes never re-creates engine sources and configure
//! commands update one well-known place.

use std::collections::HashMap;
use std::sync::Arc;

use stagecast_common::{Result, StagecastError};
use stagecast_engine::{MediaEngine, SourceId};
use stagecast_protocol::{SourceKind, SourceSettings};

struct RegisteredSource {
    id: SourceId,
    settings: SourceSettings,
}

pub struct SourceRegistry {
    engine: Arc<dyn MediaEngine>,
    entries: HashMap<SourceKind, RegisteredSource>,
}

impl SourceRegistry {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        SourceRegistry {
            engine,
            entries: HashMap::new(),
        }
    }

    /// Handle for a kind, creating the source with default settings on
    /// first use.
    pub fn ensure(&mut self, kind: SourceKind) -> Result<SourceId> {
        if let Some(entry) = self.entries.get(&kind) {
            return Ok(entry.id);
        }
        let settings = SourceSettings::default_for(kind);
        let id = self.engine.create_source(kind, &settings)?;
        tracing::debug!(%kind, source = id.0, "source registered");
        self.entries.insert(kind, RegisteredSource { id, settings });
        Ok(id)
    }

    /// Create or reconfigure a kind with explicit settings.
    pub fn ensure_with(&mut self, kind: SourceKind, settings: SourceSettings) -> Result<SourceId> {
        match self.entries.get_mut(&kind) {
            Some(entry) => {
                self.engine.update_source(entry.id, &settings)?;
                entry.settings = settings;
                Ok(entry.id)
            }
            None => {
                let id = self.engine.create_source(kind, &settings)?;
                tracing::debug!(%kind, source = id.0, "source registered");
                self.entries.insert(kind, RegisteredSource { id, settings });
                Ok(id)
            }
        }
    }

    /// Mutate a registered source's settings and push them to the
    /// engine. The source must already exist.
    pub fn update(
        &mut self,
        kind: SourceKind,
        apply: impl FnOnce(&mut SourceSettings),
    ) -> Result<()> {
        let entry = self.entries.get_mut(&kind).ok_or_else(|| {
            StagecastError::precondition(format!("{kind} source is not initialized"))
        })?;
        apply(&mut entry.settings);
        self.engine.update_source(entry.id, &entry.settings)
    }

    pub fn get(&self, kind: SourceKind) -> Option<SourceId> {
        self.entries.get(&kind).map(|entry| entry.id)
    }

    /// Current settings snapshot for a kind.
    pub fn settings(&self, kind: SourceKind) -> Option<SourceSettings> {
        self.entries.get(&kind).map(|entry| entry.settings.clone())
    }

    /// Forget all sources. Engine-side teardown happens with engine
    /// shutdown, not here.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
