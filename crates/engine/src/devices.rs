//! Capture device enumeration.
//!
//! Webcams come from `/dev/videoN` nodes with friendly names read out
//! of sysfs; audio sources come from `pactl list sources short`. Both
//! enumerations degrade to an empty list when the machine has no such
//! stack, and the parsers are pure functions so the formats stay
//! covered by tests.

use stagecast_protocol::DeviceInfo;

/// Enumerate V4L2 capture devices with their sysfs names.
pub fn list_webcams() -> Vec<DeviceInfo> {
    let mut devices = Vec::new();
    for idx in 0..16u32 {
        let dev_path = format!("/dev/video{idx}");
        if !std::path::Path::new(&dev_path).exists() {
            continue;
        }
        let name = std::fs::read_to_string(format!("/sys/class/video4linux/video{idx}/name"))
            .map(|name| name.trim().to_string())
            .unwrap_or_else(|_| dev_path.clone());
        devices.push(DeviceInfo::new(dev_path, name));
    }
    tracing::debug!(count = devices.len(), "enumerated webcam devices");
    devices
}

/// Enumerate PulseAudio sources.
///
/// `monitors` selects sink loopbacks (desktop audio) instead of real
/// inputs (microphones).
pub fn list_audio_sources(monitors: bool) -> Vec<DeviceInfo> {
    let output = std::process::Command::new("pactl")
        .args(["list", "sources", "short"])
        .output();
    match output {
        Ok(output) if output.status.success() => {
            parse_pactl_sources(&String::from_utf8_lossy(&output.stdout), monitors)
        }
        Ok(output) => {
            tracing::warn!(status = %output.status, "pactl list sources failed");
            Vec::new()
        }
        Err(err) => {
            tracing::warn!(error = %err, "could not run pactl");
            Vec::new()
        }
    }
}

/// Parse `pactl list sources short` output.
///
/// Lines are tab-separated: index, name, driver, sample spec, state.
/// Source names ending in `.monitor` are sink loopbacks.
pub fn parse_pactl_sources(text: &str, monitors: bool) -> Vec<DeviceInfo> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let _index = fields.next()?;
            let name = fields.next()?.trim();
            if name.is_empty() {
                return None;
            }
            if name.ends_with(".monitor") != monitors {
                return None;
            }
            Some(DeviceInfo::new(name, name))
        })
        .collect()
}
