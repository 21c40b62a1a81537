//! Per-item placement within a scene.
//!
//! Crop is applied to the source first (pixels trimmed from each edge),
//! then the remainder is scaled and positioned on the canvas. All
//! fields are optional on the wire and default to the identity
//! placement: no crop, origin position, 1.0 scale.

use serde::{Deserialize, Serialize};

/// Crop, position, and scale applied to one scene item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transform {
    /// Pixels cropped from the left edge of the source.
    pub crop_left: u32,
    /// Pixels cropped from the top edge.
    pub crop_top: u32,
    /// Pixels cropped from the right edge.
    pub crop_right: u32,
    /// Pixels cropped from the bottom edge.
    pub crop_bottom: u32,
    /// Horizontal position of the item on the canvas.
    pub pos_x: i32,
    /// Vertical position of the item on the canvas.
    pub pos_y: i32,
    /// Horizontal scale factor. Must be positive.
    pub scale_x: f32,
    /// Vertical scale factor. Must be positive.
    pub scale_y: f32,
}

impl Transform {
    /// No crop, origin position, unit scale.
    pub const IDENTITY: Transform = Transform {
        crop_left: 0,
        crop_top: 0,
        crop_right: 0,
        crop_bottom: 0,
        pos_x: 0,
        pos_y: 0,
        scale_x: 1.0,
        scale_y: 1.0,
    };

    /// Crop-only transform, everything else identity.
    pub fn from_crops(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Transform {
            crop_left: left,
            crop_top: top,
            crop_right: right,
            crop_bottom: bottom,
            ..Transform::IDENTITY
        }
    }

    /// True when applying this transform changes nothing.
    ///
    /// Items with an identity transform keep whatever placement the
    /// canvas gives them by default, so callers can skip the explicit
    /// crop/position/scale pass entirely.
    pub fn is_identity(&self) -> bool {
        *self == Transform::IDENTITY
    }

    /// Check scale factors, returning the offending wire field name.
    ///
    /// Zero or negative scale collapses the item to nothing (and NaN
    /// compares false against everything), so both are rejected before
    /// the transform reaches an engine.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(self.scale_x > 0.0) {
            return Err("scaleX");
        }
        if !(self.scale_y > 0.0) {
            return Err("scaleY");
        }
        Ok(())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform::IDENTITY
    }
}
