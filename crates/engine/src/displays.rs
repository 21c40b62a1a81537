//! Display detection for capture-source geometry.
//!
//! Monitor layout comes from `xrandr --listmonitors`, parsed with a
//! pure function so the format handling is testable. When xrandr is
//! unavailable (headless CI, Wayland-only boxes) detection falls back
//! to a single default monitor rather than failing the session.

use stagecast_protocol::DeviceInfo;

/// One connected monitor in desktop coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorGeometry {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
    pub primary: bool,
}

impl MonitorGeometry {
    /// Capture region for `ximagesrc`: origin plus size.
    pub fn region(&self) -> (i32, i32, u32, u32) {
        (self.x, self.y, self.width, self.height)
    }
}

fn fallback_monitor() -> MonitorGeometry {
    MonitorGeometry {
        name: "default".to_string(),
        width: 1920,
        height: 1080,
        x: 0,
        y: 0,
        primary: true,
    }
}

/// Detect connected monitors, falling back to one default monitor.
pub fn detect_monitors() -> Vec<MonitorGeometry> {
    let output = std::process::Command::new("xrandr")
        .arg("--listmonitors")
        .output();
    let monitors = match output {
        Ok(output) if output.status.success() => {
            parse_listmonitors(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) => {
            tracing::warn!(status = %output.status, "xrandr --listmonitors failed");
            Vec::new()
        }
        Err(err) => {
            tracing::warn!(error = %err, "could not run xrandr");
            Vec::new()
        }
    };

    if monitors.is_empty() {
        tracing::warn!("no monitors detected, assuming one 1920x1080 display");
        return vec![fallback_monitor()];
    }
    tracing::debug!(count = monitors.len(), "detected monitors");
    monitors
}

/// Pick the capture region for a display index.
///
/// `None` selects the primary monitor; an out-of-range index selects
/// nothing and the caller reports it.
pub fn monitor_region(
    monitors: &[MonitorGeometry],
    display_num: Option<u32>,
) -> Option<(i32, i32, u32, u32)> {
    match display_num {
        Some(index) => monitors.get(index as usize).map(MonitorGeometry::region),
        None => monitors
            .iter()
            .find(|m| m.primary)
            .or_else(|| monitors.first())
            .map(MonitorGeometry::region),
    }
}

/// Monitor list as wire device entries, geometry included.
pub fn monitors_as_devices(monitors: &[MonitorGeometry]) -> Vec<DeviceInfo> {
    monitors
        .iter()
        .map(|m| DeviceInfo::new(&m.name, &m.name).with_geometry(m.width, m.height))
        .collect()
}

/// Parse `xrandr --listmonitors` output.
///
/// Lines look like ` 0: +*eDP-1 2560/309x1440/174+0+0  eDP-1`, where
/// `*` marks the primary monitor and sizes carry a `/millimeters`
/// suffix. Unparseable lines are skipped.
pub fn parse_listmonitors(text: &str) -> Vec<MonitorGeometry> {
    text.lines().filter_map(parse_monitor_line).collect()
}

fn parse_monitor_line(line: &str) -> Option<MonitorGeometry> {
    let mut tokens = line.split_whitespace();
    let index = tokens.next()?;
    if !index.ends_with(':') || !index.trim_end_matches(':').chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let flags = tokens.next()?;
    let geometry = tokens.next()?;
    let connector = tokens.next()?;

    let primary = flags.contains('*');
    let (width_part, rest) = geometry.split_once('x')?;
    let width: u32 = width_part.split('/').next()?.parse().ok()?;

    // `rest` is `1440/174+0+0`; the offsets keep their signs, so a
    // monitor left of the origin reads `...-2560+0`.
    let first_sign = rest.find(['+', '-'])?;
    let height: u32 = rest[..first_sign].split('/').next()?.parse().ok()?;
    let offsets = &rest[first_sign..];
    let second_sign = offsets[1..].find(['+', '-']).map(|i| i + 1)?;
    let x: i32 = offsets[..second_sign].parse().ok()?;
    let y: i32 = offsets[second_sign..].parse().ok()?;

    Some(MonitorGeometry {
        name: connector.to_string(),
        width,
        height,
        x,
        y,
        primary,
    })
}
