//! Scene collection lifecycle: build, bind, switch, tear down.
//!
//! Scene layout commands always replace the whole collection. The new
//! scenes are built and bound before the old ones are released, so a
//! rebuild that fails partway leaves the session on its previous
//! layout.

use std::sync::Arc;

use stagecast_common::{Result, StagecastError};
use stagecast_engine::{MediaEngine, SceneId, SlotBinding, VIDEO_SLOT};
use stagecast_protocol::ScenePlan;

use crate::registry::SourceRegistry;

pub struct SceneSet {
    engine: Arc<dyn MediaEngine>,
    scenes: Vec<SceneId>,
    active: usize,
}

impl SceneSet {
    pub fn new(engine: Arc<dyn MediaEngine>) -> Self {
        SceneSet {
            engine,
            scenes: Vec::new(),
            active: 0,
        }
    }

    /// Replace the collection with scenes built from `plans` and make
    /// scene 0 the program scene. An empty `plans` clears the program
    /// slot.
    pub fn rebuild(&mut self, plans: &[ScenePlan], registry: &mut SourceRegistry) -> Result<()> {
        for plan in plans {
            for item in &plan.item_sources {
                // Transforms only apply to video items; a crop or scale
                // on an audio item is ignored, not rejected.
                let video = item.source_kind().is_some_and(|kind| !kind.is_audio());
                if video {
                    if let Err(field) = item.transform.validate() {
                        return Err(StagecastError::validation(format!(
                            "{field} must be positive"
                        )));
                    }
                }
            }
        }

        let built = self.build_all(plans, registry)?;

        // Rebind before releasing: the engine refuses to release a
        // scene that is still bound to a slot.
        if let Err(err) = self
            .engine
            .bind_output_slot(VIDEO_SLOT, built.first().copied().map(SlotBinding::Scene))
        {
            self.release_all(&built);
            return Err(err);
        }

        let old = std::mem::replace(&mut self.scenes, built);
        self.active = 0;
        self.release_all(&old);
        tracing::info!(scenes = self.scenes.len(), "scene collection rebuilt");
        Ok(())
    }

    /// Bind the scene at `index` to the program slot.
    pub fn switch_to(&mut self, index: usize) -> Result<()> {
        let Some(&scene) = self.scenes.get(index) else {
            return Err(StagecastError::precondition(format!(
                "scene {index} does not exist ({} configured)",
                self.scenes.len()
            )));
        };
        self.engine
            .bind_output_slot(VIDEO_SLOT, Some(SlotBinding::Scene(scene)))?;
        self.active = index;
        tracing::info!(scene = index, "switched program scene");
        Ok(())
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Unbind the program slot and release every scene.
    pub fn clear(&mut self) {
        if self.scenes.is_empty() {
            return;
        }
        if let Err(err) = self.engine.bind_output_slot(VIDEO_SLOT, None) {
            tracing::warn!(error = %err, "failed to clear program slot");
        }
        let old = std::mem::take(&mut self.scenes);
        self.active = 0;
        self.release_all(&old);
    }

    fn build_all(&self, plans: &[ScenePlan], registry: &mut SourceRegistry) -> Result<Vec<SceneId>> {
        let mut built = Vec::with_capacity(plans.len());
        for (index, plan) in plans.iter().enumerate() {
            match self.build_scene(index, plan, registry) {
                Ok(id) => built.push(id),
                Err(err) => {
                    self.release_all(&built);
                    return Err(err);
                }
            }
        }
        Ok(built)
    }

    fn build_scene(
        &self,
        index: usize,
        plan: &ScenePlan,
        registry: &mut SourceRegistry,
    ) -> Result<SceneId> {
        let scene = self.engine.create_scene(&format!("scene-{index}"))?;
        if let Err(err) = self.fill_scene(scene, index, plan, registry) {
            self.release_all(&[scene]);
            return Err(err);
        }
        Ok(scene)
    }

    fn fill_scene(
        &self,
        scene: SceneId,
        index: usize,
        plan: &ScenePlan,
        registry: &mut SourceRegistry,
    ) -> Result<()> {
        for item in &plan.item_sources {
            let Some(kind) = item.source_kind() else {
                tracing::warn!(scene = index, kind = %item.kind, "skipping item of unknown type");
                continue;
            };
            let source = registry.ensure(kind)?;
            let item_id = self.engine.add_scene_item(scene, source)?;
            if !kind.is_audio() && !item.transform.is_identity() {
                self.engine.set_item_transform(scene, item_id, &item.transform)?;
            }
        }
        Ok(())
    }

    fn release_all(&self, scenes: &[SceneId]) {
        for &scene in scenes {
            if let Err(err) = self.engine.release_scene(scene) {
                tracing::warn!(scene = scene.0, error = %err, "failed to release scene");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagecast_common::SessionDefaults;
    use stagecast_engine::{EnginePaths, SimEngine};
    use stagecast_protocol::{AudioConfig, SceneItemPlan, Transform, VideoConfig};

    fn engine() -> Arc<SimEngine> {
        let engine = Arc::new(SimEngine::new());
        let defaults = SessionDefaults::default();
        engine
            .startup(
                &EnginePaths {
                    plugin_dir: "/tmp/p".into(),
                    exe_dir: "/tmp/e".into(),
                    data_dir: "/tmp/d".into(),
                },
                &VideoConfig::from_defaults(&defaults),
                &AudioConfig::from_defaults(&defaults),
            )
            .unwrap();
        engine
    }

    fn item(kind: &str, transform: Transform) -> SceneItemPlan {
        SceneItemPlan {
            kind: kind.to_owned(),
            transform,
        }
    }

    fn plan(items: Vec<SceneItemPlan>) -> ScenePlan {
        ScenePlan {
            item_sources: items,
        }
    }

    #[test]
    fn rebuild_binds_scene_zero_and_switch_rebinds() {
        let engine = engine();
        let mut registry = SourceRegistry::new(Arc::clone(&engine) as _);
        let mut scenes = SceneSet::new(Arc::clone(&engine) as _);

        scenes
            .rebuild(
                &[
                    plan(vec![item("display", Transform::IDENTITY)]),
                    plan(vec![item("webcam", Transform::IDENTITY)]),
                ],
                &mut registry,
            )
            .unwrap();

        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes.active_index(), 0);
        let bound = engine.bound_scene(VIDEO_SLOT).unwrap();

        scenes.switch_to(1).unwrap();
        assert_eq!(scenes.active_index(), 1);
        assert_ne!(engine.bound_scene(VIDEO_SLOT).unwrap(), bound);

        let err = scenes.switch_to(5).unwrap_err();
        assert!(err.to_string().contains("scene 5"));
        assert_eq!(scenes.active_index(), 1);
    }

    #[test]
    fn rebuild_replaces_old_scenes_and_empty_plans_clear_the_slot() {
        let engine = engine();
        let mut registry = SourceRegistry::new(Arc::clone(&engine) as _);
        let mut scenes = SceneSet::new(Arc::clone(&engine) as _);

        scenes
            .rebuild(&[plan(vec![]), plan(vec![]), plan(vec![])], &mut registry)
            .unwrap();
        assert_eq!(engine.scene_count(), 3);

        scenes
            .rebuild(&[plan(vec![item("display", Transform::IDENTITY)])], &mut registry)
            .unwrap();
        assert_eq!(engine.scene_count(), 1);

        scenes.rebuild(&[], &mut registry).unwrap();
        assert_eq!(engine.scene_count(), 0);
        assert!(engine.bound_scene(VIDEO_SLOT).is_none());
        assert!(scenes.is_empty());
    }

    #[test]
    fn items_of_unknown_type_are_skipped() {
        let engine = engine();
        let mut registry = SourceRegistry::new(Arc::clone(&engine) as _);
        let mut scenes = SceneSet::new(Arc::clone(&engine) as _);

        scenes
            .rebuild(
                &[plan(vec![
                    item("display", Transform::IDENTITY),
                    item("teleprompter", Transform::IDENTITY),
                    item("microphone", Transform::IDENTITY),
                ])],
                &mut registry,
            )
            .unwrap();

        let scene = engine.bound_scene(VIDEO_SLOT).unwrap();
        assert_eq!(engine.scene_items(scene).len(), 2);
    }

    #[test]
    fn invalid_scale_fails_before_any_engine_work() {
        let engine = engine();
        let mut registry = SourceRegistry::new(Arc::clone(&engine) as _);
        let mut scenes = SceneSet::new(Arc::clone(&engine) as _);

        let mut bad = Transform::IDENTITY;
        bad.scale_x = 0.0;
        let err = scenes
            .rebuild(
                &[plan(vec![]), plan(vec![item("webcam", bad)])],
                &mut registry,
            )
            .unwrap_err();

        assert!(err.to_string().contains("scaleX"));
        assert_eq!(engine.scene_count(), 0);
    }

    #[test]
    fn non_identity_transform_reaches_the_engine() {
        let engine = engine();
        let mut registry = SourceRegistry::new(Arc::clone(&engine) as _);
        let mut scenes = SceneSet::new(Arc::clone(&engine) as _);

        let placed = Transform {
            pos_x: 3840,
            pos_y: 2160,
            scale_x: 0.25,
            scale_y: 0.25,
            ..Transform::IDENTITY
        };
        scenes
            .rebuild(
                &[plan(vec![
                    item("display", Transform::IDENTITY),
                    item("webcam", placed),
                ])],
                &mut registry,
            )
            .unwrap();

        let scene = engine.bound_scene(VIDEO_SLOT).unwrap();
        let items = engine.scene_items(scene);
        assert_eq!(items[0].2, Transform::IDENTITY);
        assert_eq!(items[1].2, placed);
    }
}
