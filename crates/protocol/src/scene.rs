//! Scene layout plans as they arrive on the wire.

use serde::Deserialize;

use crate::source::SourceKind;
use crate::transform::Transform;

/// One scene: an ordered list of items referencing session sources.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenePlan {
    #[serde(default)]
    pub item_sources: Vec<SceneItemPlan>,
}

/// One item within a scene plan.
///
/// The `type` string is kept raw so an unrecognized kind can be
/// skipped with a warning instead of failing the whole command.
/// Transform fields ride alongside and default to identity.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneItemPlan {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub transform: Transform,
}

impl SceneItemPlan {
    /// The parsed source kind, if this item names a known one.
    pub fn source_kind(&self) -> Option<SourceKind> {
        SourceKind::parse(&self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_plan_parses_items_with_inline_transforms() {
        let plan: ScenePlan = serde_json::from_str(
            r#"{"itemSources":[
                {"type":"display","cropLeft":100,"cropRight":100},
                {"type":"webcam","posX":40,"posY":60,"scaleX":0.25,"scaleY":0.25},
                {"type":"microphone"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(plan.item_sources.len(), 3);
        assert_eq!(plan.item_sources[0].source_kind(), Some(SourceKind::Display));
        assert_eq!(plan.item_sources[0].transform.crop_left, 100);
        assert_eq!(plan.item_sources[1].transform.pos_y, 60);
        assert!(plan.item_sources[2].transform.is_identity());
    }

    #[test]
    fn empty_scene_and_unknown_kind_are_tolerated() {
        let plan: ScenePlan = serde_json::from_str("{}").unwrap();
        assert!(plan.item_sources.is_empty());

        let plan: ScenePlan =
            serde_json::from_str(r#"{"itemSources":[{"type":"teleprompter"}]}"#).unwrap();
        assert_eq!(plan.item_sources[0].source_kind(), None);
    }
}
