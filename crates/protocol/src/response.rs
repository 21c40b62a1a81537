//! Response lines written back to the caller.

use serde::{Deserialize, Serialize};

/// One response object, serialized as a single output line.
///
/// Success responses carry only the echoed `actionId`. Error responses
/// add an `error` string; device listings add a `devices` array. The
/// `actionId` is absent only for protocol errors on lines that never
/// yielded a correlation token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<DeviceInfo>>,
}

impl Response {
    /// Plain acknowledgement for a completed action.
    pub fn ok(action_id: impl Into<String>) -> Self {
        Response {
            action_id: Some(action_id.into()),
            error: None,
            devices: None,
        }
    }

    /// Error response, correlated when an `actionId` is known.
    pub fn error(action_id: Option<String>, message: impl Into<String>) -> Self {
        Response {
            action_id,
            error: Some(message.into()),
            devices: None,
        }
    }

    /// Device-listing response.
    pub fn devices(action_id: impl Into<String>, devices: Vec<DeviceInfo>) -> Self {
        Response {
            action_id: Some(action_id.into()),
            error: None,
            devices: Some(devices),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// One enumerated capture device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    /// Native width, where the backend reports geometry (displays).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Native height, where the backend reports geometry (displays).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl DeviceInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        DeviceInfo {
            id: id.into(),
            name: name.into(),
            width: None,
            height: None,
        }
    }

    pub fn with_geometry(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}
