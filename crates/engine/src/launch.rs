//! GStreamer launch-description construction for the `gst` engine.
//!
//! Everything here is pure string assembly so that element wiring,
//! capture geometry, and target addressing can be unit tested without
//! a GStreamer installation. The runtime wrapper behind the `gst`
//! feature feeds these fragments to `gst::parse::launch`.

use std::path::Path;

use stagecast_common::{Result, StagecastError};
use stagecast_protocol::{OutputTarget, Transform};

/// Name of the appsink element that taps composed frames.
pub const FRAME_TAP_SINK: &str = "frame-tap";

/// Capture region fragment for `ximagesrc`, inclusive end coordinates.
pub fn region_fragment(region: Option<(i32, i32, u32, u32)>) -> Result<String> {
    let Some((x, y, width, height)) = region else {
        return Ok(String::new());
    };
    if width == 0 || height == 0 {
        return Err(StagecastError::engine(format!(
            "invalid display capture region: zero size ({width}x{height})"
        )));
    }
    let endx = x + width as i32 - 1;
    let endy = y + height as i32 - 1;
    Ok(format!(" startx={x} starty={y} endx={endx} endy={endy}"))
}

/// Display capture bin: whole desktop, a monitor region, or one window.
pub fn display_source_bin(
    region: Option<(i32, i32, u32, u32)>,
    window: Option<&str>,
    fps: u32,
) -> Result<String> {
    let xname = match window {
        Some(name) => format!(" xname=\"{}\"", escape_quotes(name)),
        None => String::new(),
    };
    let region = region_fragment(region)?;
    // `use-damage=false` forces full frames; incremental damage updates
    // would starve the compositor of complete pictures.
    Ok(format!(
        "ximagesrc use-damage=false show-pointer=true{xname}{region} ! queue max-size-buffers=8 leaky=downstream ! videoconvert ! videorate ! video/x-raw,framerate={fps}/1"
    ))
}

/// Webcam capture bin normalized to the requested geometry.
pub fn webcam_source_bin(device: &str, width: u32, height: u32, fps: u32) -> String {
    let device = device_fragment(device);
    format!(
        "v4l2src{device} ! queue max-size-buffers=8 leaky=downstream ! videoconvert ! videoscale ! videorate ! video/x-raw,width={width},height={height},framerate={fps}/1"
    )
}

/// Microphone capture bin.
///
/// A positive sync offset is expressed as queue back-pressure that
/// delays audio relative to video. Negative offsets cannot be built in
/// launch syntax; they are clamped to zero here and the caller logs it.
pub fn microphone_source_bin(device: &str, sync_offset_ns: i64, sample_rate: u32) -> String {
    let device = device_fragment(device);
    let offset = if sync_offset_ns > 0 {
        format!(" max-size-time=0 min-threshold-time={sync_offset_ns}")
    } else {
        String::new()
    };
    format!(
        "pulsesrc do-timestamp=true{device} ! queue{offset} ! audioconvert ! audioresample ! audio/x-raw,rate={sample_rate}"
    )
}

/// Desktop audio loopback bin, via the sink monitor source.
pub fn desktop_audio_source_bin(device: Option<&str>, sample_rate: u32) -> String {
    let device = device_fragment(device.unwrap_or("@DEFAULT_MONITOR@"));
    format!(
        "pulsesrc do-timestamp=true{device} ! queue ! audioconvert ! audioresample ! audio/x-raw,rate={sample_rate}"
    )
}

/// Crop fragment for one scene item, empty for crop-free transforms.
pub fn videocrop_fragment(transform: &Transform) -> String {
    if transform.crop_left == 0
        && transform.crop_top == 0
        && transform.crop_right == 0
        && transform.crop_bottom == 0
    {
        return String::new();
    }
    format!(
        " ! videocrop left={} right={} top={} bottom={}",
        transform.crop_left, transform.crop_right, transform.crop_top, transform.crop_bottom
    )
}

/// Placement of one compositor sink pad, already resolved to pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositorPad {
    pub index: usize,
    pub xpos: i32,
    pub ypos: i32,
    /// Scaled width, `None` to keep the branch's native width.
    pub width: Option<u32>,
    /// Scaled height, `None` to keep the branch's native height.
    pub height: Option<u32>,
}

impl CompositorPad {
    /// Resolve an item transform against the branch's native geometry.
    ///
    /// Scale factors apply to the post-crop size; unit scale leaves
    /// the pad size unset so the branch keeps its native dimensions.
    pub fn from_transform(
        index: usize,
        transform: &Transform,
        native_width: u32,
        native_height: u32,
    ) -> Self {
        let cropped_w = native_width
            .saturating_sub(transform.crop_left.saturating_add(transform.crop_right))
            .max(1);
        let cropped_h = native_height
            .saturating_sub(transform.crop_top.saturating_add(transform.crop_bottom))
            .max(1);
        let (width, height) = if transform.scale_x == 1.0 && transform.scale_y == 1.0 {
            (None, None)
        } else {
            (
                Some(((cropped_w as f32 * transform.scale_x).round() as u32).max(1)),
                Some(((cropped_h as f32 * transform.scale_y).round() as u32).max(1)),
            )
        };
        CompositorPad {
            index,
            xpos: transform.pos_x,
            ypos: transform.pos_y,
            width,
            height,
        }
    }
}

/// Compositor element with per-pad placement properties.
pub fn compositor_fragment(name: &str, pads: &[CompositorPad]) -> String {
    let mut launch = format!("compositor name={name} background=black");
    for pad in pads {
        let i = pad.index;
        launch.push_str(&format!(
            " sink_{i}::xpos={} sink_{i}::ypos={}",
            pad.xpos, pad.ypos
        ));
        if let Some(width) = pad.width {
            launch.push_str(&format!(" sink_{i}::width={width}"));
        }
        if let Some(height) = pad.height {
            launch.push_str(&format!(" sink_{i}::height={height}"));
        }
    }
    launch
}

/// Audio mixer element all audio bins feed into.
pub fn audiomixer_fragment(name: &str) -> String {
    format!("audiomixer name={name}")
}

/// H.264 encode chain for one output branch.
pub fn video_encode_fragment(fps: u32, bitrate_kbps: u32) -> String {
    // One keyframe every 2 seconds: seekable output without inflating
    // file size or stream bitrate.
    let keyint = fps.saturating_mul(2).max(2);
    format!(
        "x264enc tune=zerolatency speed-preset=veryfast bitrate={bitrate_kbps} key-int-max={keyint} ! h264parse ! queue max-size-buffers=8"
    )
}

/// AAC encode chain for one output branch.
pub fn audio_encode_fragment(bitrate_bps: u32) -> String {
    format!("avenc_aac bitrate={bitrate_bps} ! aacparse ! queue max-size-buffers=8")
}

/// Muxer element for a recording path, chosen by extension.
pub fn muxer_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp4") | Some("m4v") | Some("mov") => "mp4mux",
        Some("flv") => "flvmux streamable=true",
        _ => "matroskamux",
    }
}

/// Full RTMP target location from a server URL and stream key.
pub fn rtmp_location(url: &str, key: &str) -> String {
    format!("{}/{key}", url.trim_end_matches('/'))
}

/// Muxer plus final sink for one output target.
pub fn mux_sink_fragment(target: &OutputTarget, mux_name: &str) -> Result<String> {
    match target {
        OutputTarget::File { path } => {
            let muxer = muxer_for_path(path);
            let path = escape_path(path);
            Ok(format!("{muxer} name={mux_name} ! filesink location=\"{path}\""))
        }
        OutputTarget::Stream { url, key } => {
            if url.is_empty() {
                return Err(StagecastError::validation("streamURL must not be empty"));
            }
            let location = rtmp_location(url, key);
            Ok(format!(
                "flvmux name={mux_name} streamable=true ! rtmpsink location=\"{} live=1\"",
                escape_quotes(&location)
            ))
        }
    }
}

/// Appsink branch delivering composed RGBA frames at the tap geometry.
pub fn frame_tap_fragment(width: u32, height: u32) -> String {
    format!(
        "videoscale ! videoconvert ! video/x-raw,format=RGBA,width={width},height={height} ! appsink name={FRAME_TAP_SINK} emit-signals=true max-buffers=2 drop=true sync=false"
    )
}

fn device_fragment(device: &str) -> String {
    if device.is_empty() || device == "default" {
        return String::new();
    }
    format!(" device=\"{}\"", escape_quotes(device))
}

fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('"', "\\\"")
}

fn escape_quotes(s: &str) -> String {
    s.replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn region_fragment_uses_inclusive_end_coordinates() {
        let fragment = region_fragment(Some((2560, 0, 2560, 1440))).unwrap();
        assert_eq!(fragment, " startx=2560 starty=0 endx=5119 endy=1439");
    }

    #[test]
    fn region_fragment_rejects_zero_size() {
        let err = region_fragment(Some((0, 0, 1920, 0))).unwrap_err();
        assert!(err.to_string().contains("zero size"));
    }

    #[test]
    fn display_bin_prefers_window_capture_when_named() {
        let launch = display_source_bin(None, Some("Budget Review"), 30).unwrap();
        assert!(launch.starts_with(
            "ximagesrc use-damage=false show-pointer=true xname=\"Budget Review\""
        ));
        assert!(launch.ends_with("video/x-raw,framerate=30/1"));
    }

    #[test]
    fn webcam_bin_pins_geometry_and_rate() {
        let launch = webcam_source_bin("/dev/video2", 1280, 720, 30);
        assert!(launch.starts_with("v4l2src device=\"/dev/video2\""));
        assert!(launch.contains("video/x-raw,width=1280,height=720,framerate=30/1"));
    }

    #[test]
    fn default_devices_omit_the_device_property() {
        let launch = microphone_source_bin("default", 0, 44_100);
        assert!(launch.starts_with("pulsesrc do-timestamp=true ! queue !"));
        assert!(launch.ends_with("audio/x-raw,rate=44100"));
    }

    #[test]
    fn positive_sync_offset_becomes_queue_threshold() {
        let launch = microphone_source_bin("alsa_input.usb", 120_000_000, 44_100);
        assert!(launch.contains("device=\"alsa_input.usb\""));
        assert!(launch.contains("queue max-size-time=0 min-threshold-time=120000000"));

        let launch = microphone_source_bin("alsa_input.usb", -40_000_000, 44_100);
        assert!(!launch.contains("min-threshold-time"));
    }

    #[test]
    fn desktop_audio_defaults_to_the_sink_monitor() {
        let launch = desktop_audio_source_bin(None, 44_100);
        assert!(launch.contains("device=\"@DEFAULT_MONITOR@\""));
    }

    #[test]
    fn crop_free_transform_adds_no_element() {
        assert_eq!(videocrop_fragment(&Transform::IDENTITY), "");
        let cropped = videocrop_fragment(&Transform::from_crops(10, 20, 30, 40));
        assert_eq!(cropped, " ! videocrop left=10 right=30 top=20 bottom=40");
    }

    #[test]
    fn compositor_pads_carry_position_and_optional_scale() {
        let pads = [
            CompositorPad {
                index: 0,
                xpos: 0,
                ypos: 0,
                width: None,
                height: None,
            },
            CompositorPad {
                index: 1,
                xpos: 40,
                ypos: 60,
                width: Some(320),
                height: Some(180),
            },
        ];
        assert_eq!(
            compositor_fragment("mix", &pads),
            "compositor name=mix background=black sink_0::xpos=0 sink_0::ypos=0 sink_1::xpos=40 sink_1::ypos=60 sink_1::width=320 sink_1::height=180"
        );
    }

    #[test]
    fn pad_resolution_scales_the_cropped_size() {
        let mut transform = Transform::from_crops(100, 0, 100, 0);
        transform.pos_x = 40;
        transform.pos_y = 60;
        transform.scale_x = 0.5;
        transform.scale_y = 0.5;

        let pad = CompositorPad::from_transform(1, &transform, 1920, 1080);
        assert_eq!(pad.xpos, 40);
        assert_eq!(pad.ypos, 60);
        // (1920 - 200) * 0.5 and 1080 * 0.5.
        assert_eq!(pad.width, Some(860));
        assert_eq!(pad.height, Some(540));

        let pad = CompositorPad::from_transform(0, &Transform::IDENTITY, 1920, 1080);
        assert_eq!((pad.width, pad.height), (None, None));
    }

    #[test]
    fn over_cropped_items_never_collapse_to_zero() {
        let mut transform = Transform::from_crops(2000, 0, 2000, 0);
        transform.scale_x = 0.5;
        transform.scale_y = 0.5;
        let pad = CompositorPad::from_transform(0, &transform, 1920, 1080);
        assert_eq!(pad.width, Some(1));
    }

    #[test]
    fn muxer_follows_recording_extension() {
        assert_eq!(muxer_for_path(&PathBuf::from("/tmp/out.mp4")), "mp4mux");
        assert_eq!(muxer_for_path(&PathBuf::from("/tmp/out.MOV")), "mp4mux");
        assert_eq!(muxer_for_path(&PathBuf::from("/tmp/out.mkv")), "matroskamux");
        assert_eq!(muxer_for_path(&PathBuf::from("/tmp/out")), "matroskamux");
    }

    #[test]
    fn rtmp_location_joins_url_and_key_once() {
        assert_eq!(
            rtmp_location("rtmp://live.example/app/", "k3y"),
            "rtmp://live.example/app/k3y"
        );
        assert_eq!(
            rtmp_location("rtmp://live.example/app", "k3y"),
            "rtmp://live.example/app/k3y"
        );
    }

    #[test]
    fn stream_sink_wraps_flvmux_and_rtmpsink() {
        let target = OutputTarget::stream("rtmp://live.example/app", "k3y");
        let launch = mux_sink_fragment(&target, "mux0").unwrap();
        assert_eq!(
            launch,
            "flvmux name=mux0 streamable=true ! rtmpsink location=\"rtmp://live.example/app/k3y live=1\""
        );

        let err = mux_sink_fragment(&OutputTarget::stream("", "k"), "mux0").unwrap_err();
        assert!(err.to_string().contains("streamURL"));
    }

    #[test]
    fn file_sink_quotes_awkward_paths() {
        let target = OutputTarget::file("/tmp/client \"final\" cut.mp4");
        let launch = mux_sink_fragment(&target, "mux1").unwrap();
        assert!(launch.starts_with("mp4mux name=mux1 ! filesink location="));
        assert!(launch.contains("client \\\"final\\\" cut.mp4"));
    }

    #[test]
    fn frame_tap_requests_packed_rgba_at_scaled_geometry() {
        let launch = frame_tap_fragment(640, 360);
        assert!(launch.contains("video/x-raw,format=RGBA,width=640,height=360"));
        assert!(launch.contains("appsink name=frame-tap"));
        assert!(launch.contains("drop=true"));
    }
}
