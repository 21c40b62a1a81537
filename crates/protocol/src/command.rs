//! Command envelope parsing.
//!
//! Each input line is parsed in two phases. The first phase reads the
//! line as loose JSON and pulls out the `actionId` correlation token,
//! so that even a command that fails the second phase can still be
//! answered on the wire. The second phase deserializes the same value
//! into the closed [`Command`] enum, which makes the action set and
//! each action's required fields a compile-time fact.

use serde::Deserialize;
use serde_json::Value;
use stagecast_common::StagecastError;

use crate::scene::ScenePlan;
use crate::source::SourcePlan;
use crate::video::VideoLayout;

/// The closed set of actions a session understands.
///
/// Wire field names are camelCase; fields typed `Option` are optional
/// on the wire, everything else is required and produces a validation
/// error naming the field when absent.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    /// Engine startup, module load, and default source creation.
    #[serde(rename_all = "camelCase")]
    Initialize {
        plugin_dir: String,
        exe_dir: String,
        data_dir: String,
    },
    /// Repoint the display source at a display index or a window.
    #[serde(rename_all = "camelCase")]
    InitializeDisplay {
        display_num: Option<u32>,
        window: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    InitializeWebcam {
        input_width: u32,
        input_height: u32,
        device_id: String,
    },
    #[serde(rename_all = "camelCase")]
    InitializeAudio {
        device_id: String,
        sync_offset_ms: i64,
    },
    #[serde(rename_all = "camelCase")]
    SetAudioDelay { audio_delay_ms: i64 },
    /// One cropped source on a fresh scene, plus a video reset.
    #[serde(rename_all = "camelCase")]
    InitializeSingleVideoRecording {
        #[serde(flatten)]
        layout: VideoLayout,
        device_type: String,
        crop_left: u32,
        crop_top: u32,
        crop_right: u32,
        crop_bottom: u32,
    },
    #[serde(rename_all = "camelCase")]
    InitializeScenes { scenes: Vec<ScenePlan> },
    /// Video reset plus raw-frame callback (re)registration, with an
    /// optional slice sub-rectangle.
    #[serde(rename_all = "camelCase")]
    InitializeRecording {
        #[serde(flatten)]
        layout: VideoLayout,
        slice_x: Option<u32>,
        slice_y: Option<u32>,
        slice_width: Option<u32>,
        slice_height: Option<u32>,
    },
    /// Full multi-source scene build plus stream and file output prep.
    #[serde(rename_all = "camelCase")]
    InitializeStreaming {
        #[serde(flatten)]
        layout: VideoLayout,
        sources: Vec<SourcePlan>,
        scenes: Vec<ScenePlan>,
        output_file: String,
    },
    #[serde(rename_all = "camelCase")]
    SwitchToScene { scene_num: usize },
    #[serde(rename_all = "camelCase")]
    StartRecording { output_file: String },
    #[serde(rename_all = "camelCase")]
    StartStreaming {
        #[serde(rename = "streamURL")]
        stream_url: String,
        stream_key: String,
    },
    PauseRecording,
    ResumeRecording,
    /// Deferred: the response is withheld until stop completion.
    StopRecording,
    /// Deferred: the response is withheld until stop completion.
    StopStreaming,
    Shutdown,
    ListAudioInputDevices,
    ListWebcamDevices,
    ListDisplays,
    #[serde(rename_all = "camelCase")]
    StartRenderFramesPipe { port: u16 },
    StopRenderFramesPipe,
}

impl Command {
    /// Wire name of the action, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Initialize { .. } => "initialize",
            Command::InitializeDisplay { .. } => "initializeDisplay",
            Command::InitializeWebcam { .. } => "initializeWebcam",
            Command::InitializeAudio { .. } => "initializeAudio",
            Command::SetAudioDelay { .. } => "setAudioDelay",
            Command::InitializeSingleVideoRecording { .. } => "initializeSingleVideoRecording",
            Command::InitializeScenes { .. } => "initializeScenes",
            Command::InitializeRecording { .. } => "initializeRecording",
            Command::InitializeStreaming { .. } => "initializeStreaming",
            Command::SwitchToScene { .. } => "switchToScene",
            Command::StartRecording { .. } => "startRecording",
            Command::StartStreaming { .. } => "startStreaming",
            Command::PauseRecording => "pauseRecording",
            Command::ResumeRecording => "resumeRecording",
            Command::StopRecording => "stopRecording",
            Command::StopStreaming => "stopStreaming",
            Command::Shutdown => "shutdown",
            Command::ListAudioInputDevices => "listAudioInputDevices",
            Command::ListWebcamDevices => "listWebcamDevices",
            Command::ListDisplays => "listDisplays",
            Command::StartRenderFramesPipe { .. } => "startRenderFramesPipe",
            Command::StopRenderFramesPipe => "stopRenderFramesPipe",
        }
    }
}

/// A parsed command together with its correlation token.
#[derive(Debug, Clone)]
pub struct CommandEnvelope {
    pub action_id: String,
    pub command: Command,
}

/// A line that could not be parsed into a command.
///
/// `action_id` is present whenever the line got far enough to yield
/// one, so the failure can still be answered with a correlated error
/// response.
#[derive(Debug)]
pub struct LineError {
    pub action_id: Option<String>,
    pub error: StagecastError,
}

impl LineError {
    fn uncorrelated(error: StagecastError) -> Self {
        LineError {
            action_id: None,
            error,
        }
    }

    fn correlated(action_id: String, error: StagecastError) -> Self {
        LineError {
            action_id: Some(action_id),
            error,
        }
    }
}

/// Parse one input line into a command envelope.
pub fn parse_line(line: &str) -> Result<CommandEnvelope, LineError> {
    let value: Value = serde_json::from_str(line).map_err(|err| {
        LineError::uncorrelated(StagecastError::protocol(format!("invalid JSON: {err}")))
    })?;
    if !value.is_object() {
        return Err(LineError::uncorrelated(StagecastError::protocol(
            "command must be a JSON object",
        )));
    }

    let action_id = match value.get("actionId").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            return Err(LineError::uncorrelated(StagecastError::protocol(
                "actionId is missing or not a string",
            )))
        }
    };
    let action = match value.get("action").and_then(Value::as_str) {
        Some(action) => action.to_string(),
        None => {
            return Err(LineError::correlated(
                action_id,
                StagecastError::protocol("action is missing or not a string"),
            ))
        }
    };

    match serde_json::from_value::<Command>(value) {
        Ok(command) => Ok(CommandEnvelope { action_id, command }),
        Err(err) => {
            // The action string was present, so a deserialize failure
            // is either an action outside the closed set or a field
            // problem within a known action.
            let error = if err.to_string().starts_with("unknown variant") {
                StagecastError::protocol(format!("unknown action `{action}`"))
            } else {
                StagecastError::validation(format!("invalid `{action}` command: {err}"))
            };
            Err(LineError::correlated(action_id, error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(line: &str) -> CommandEnvelope {
        parse_line(line).unwrap_or_else(|err| panic!("line should parse: {:?}", err))
    }

    #[test]
    fn initialize_line_parses_with_all_paths() {
        let envelope = parse_ok(
            r#"{"action":"initialize","actionId":"1","pluginDir":"/p","exeDir":"/e","dataDir":"/d"}"#,
        );
        assert_eq!(envelope.action_id, "1");
        match envelope.command {
            Command::Initialize {
                plugin_dir,
                exe_dir,
                data_dir,
            } => {
                assert_eq!(plugin_dir, "/p");
                assert_eq!(exe_dir, "/e");
                assert_eq!(data_dir, "/d");
            }
            other => panic!("wrong command: {other:?}"),
        }
    }

    #[test]
    fn unit_actions_need_no_payload() {
        for (line, name) in [
            (r#"{"action":"pauseRecording","actionId":"7"}"#, "pauseRecording"),
            (r#"{"action":"shutdown","actionId":"8"}"#, "shutdown"),
            (r#"{"action":"stopRenderFramesPipe","actionId":"9"}"#, "stopRenderFramesPipe"),
            (r#"{"action":"listDisplays","actionId":"10"}"#, "listDisplays"),
        ] {
            assert_eq!(parse_ok(line).command.name(), name);
        }
    }

    #[test]
    fn recording_layout_flattens_beside_optional_slice() {
        let envelope = parse_ok(
            r#"{"action":"initializeRecording","actionId":"2",
                "inputWidth":1920,"inputHeight":1080,"outputWidth":1280,"outputHeight":720,
                "scaledWidth":640,"scaledHeight":360,
                "sliceX":10,"sliceY":20,"sliceWidth":100,"sliceHeight":50}"#,
        );
        match envelope.command {
            Command::InitializeRecording {
                layout,
                slice_x,
                slice_width,
                ..
            } => {
                assert_eq!(layout.input_width, 1920);
                assert_eq!(layout.scaled_height, 360);
                assert_eq!(slice_x, Some(10));
                assert_eq!(slice_width, Some(100));
            }
            other => panic!("wrong command: {other:?}"),
        }
    }

    #[test]
    fn streaming_url_field_keeps_uppercase_wire_spelling() {
        let envelope = parse_ok(
            r#"{"action":"startStreaming","actionId":"3","streamURL":"rtmp://live/x","streamKey":"k"}"#,
        );
        match envelope.command {
            Command::StartStreaming {
                stream_url,
                stream_key,
            } => {
                assert_eq!(stream_url, "rtmp://live/x");
                assert_eq!(stream_key, "k");
            }
            other => panic!("wrong command: {other:?}"),
        }

        // The camelCase spelling is a different, unknown field.
        let err = parse_line(
            r#"{"action":"startStreaming","actionId":"3","streamUrl":"rtmp://live/x","streamKey":"k"}"#,
        )
        .unwrap_err();
        assert!(err.error.to_string().contains("streamURL"));
    }

    #[test]
    fn scene_plans_nest_inside_the_command() {
        let envelope = parse_ok(
            r#"{"action":"initializeScenes","actionId":"4","scenes":[
                {"itemSources":[{"type":"display"},{"type":"webcam","scaleX":0.5,"scaleY":0.5}]},
                {"itemSources":[{"type":"webcam"}]}
            ]}"#,
        );
        match envelope.command {
            Command::InitializeScenes { scenes } => {
                assert_eq!(scenes.len(), 2);
                assert_eq!(scenes[0].item_sources.len(), 2);
                assert_eq!(scenes[0].item_sources[1].transform.scale_x, 0.5);
            }
            other => panic!("wrong command: {other:?}"),
        }
    }

    #[test]
    fn malformed_json_cannot_be_correlated() {
        let err = parse_line("{not json").unwrap_err();
        assert!(err.action_id.is_none());
        assert!(err.error.to_string().contains("invalid JSON"));
    }

    #[test]
    fn non_object_lines_are_rejected() {
        let err = parse_line(r#"["initialize"]"#).unwrap_err();
        assert!(err.action_id.is_none());
        assert!(err.error.to_string().contains("JSON object"));
    }

    #[test]
    fn missing_or_numeric_action_id_is_a_protocol_error() {
        let err = parse_line(r#"{"action":"shutdown"}"#).unwrap_err();
        assert!(err.action_id.is_none());
        assert!(err.error.to_string().contains("actionId"));

        let err = parse_line(r#"{"action":"shutdown","actionId":7}"#).unwrap_err();
        assert!(err.action_id.is_none());
        assert!(err.error.to_string().contains("actionId"));
    }

    #[test]
    fn missing_action_still_reports_the_action_id() {
        let err = parse_line(r#"{"actionId":"5","outputFile":"/tmp/x.mp4"}"#).unwrap_err();
        assert_eq!(err.action_id.as_deref(), Some("5"));
        assert!(err.error.to_string().contains("action"));
    }

    #[test]
    fn unknown_action_is_named_in_the_error() {
        let err = parse_line(r#"{"action":"frobnicate","actionId":"6"}"#).unwrap_err();
        assert_eq!(err.action_id.as_deref(), Some("6"));
        assert!(err.error.to_string().contains("unknown action `frobnicate`"));
    }

    #[test]
    fn missing_required_field_is_named_in_the_error() {
        let err = parse_line(r#"{"action":"startRecording","actionId":"11"}"#).unwrap_err();
        assert_eq!(err.action_id.as_deref(), Some("11"));
        assert!(err.error.to_string().contains("outputFile"));

        let err = parse_line(
            r#"{"action":"initializeWebcam","actionId":"12","inputWidth":640,"inputHeight":480}"#,
        )
        .unwrap_err();
        assert!(err.error.to_string().contains("deviceId"));
    }

    #[test]
    fn mistyped_field_is_a_validation_error() {
        let err =
            parse_line(r#"{"action":"switchToScene","actionId":"13","sceneNum":"one"}"#)
                .unwrap_err();
        assert_eq!(err.action_id.as_deref(), Some("13"));
        assert!(err.error.to_string().contains("switchToScene"));
    }

    #[test]
    fn crop_fields_are_required_for_single_video_recording() {
        let err = parse_line(
            r#"{"action":"initializeSingleVideoRecording","actionId":"14",
                "inputWidth":1920,"inputHeight":1080,"outputWidth":1280,"outputHeight":720,
                "scaledWidth":640,"scaledHeight":360,"deviceType":"display",
                "cropLeft":0,"cropRight":0,"cropBottom":0}"#,
        )
        .unwrap_err();
        assert!(err.error.to_string().contains("cropTop"));
    }

    #[test]
    fn unknown_extra_fields_are_ignored() {
        let envelope = parse_ok(
            r#"{"action":"switchToScene","actionId":"15","sceneNum":1,"comment":"cut to cam"}"#,
        );
        match envelope.command {
            Command::SwitchToScene { scene_num } => assert_eq!(scene_num, 1),
            other => panic!("wrong command: {other:?}"),
        }
    }
}
