use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use anyhow::{anyhow, bail, Context, Result};
use probtouch::grammar::Surface;
use probtouch::{EventKind, TouchSample};

pub const TRACE_HEADER: &str = "touch_trace,ms,kind,pointer,x,y";
const TRACE_HEADER_FULL: &str = "touch_trace,ms,kind,pointer,x,y,pressure,minor,major,orientation";

/// One recorded trace row, still in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceRow {
    pub ms: u64,
    pub kind: EventKind,
    pub pointer: u8,
    pub x: f64,
    pub y: f64,
    pub pressure: f64,
    pub minor: f64,
    pub major: f64,
    pub orientation: f64,
}

impl TraceRow {
    /// Scales pixel positions and contact axes into the surface's unit
    /// square. Axes are scaled by the surface width.
    pub fn to_sample(self, surface: Surface) -> TouchSample {
        TouchSample::new(
            self.kind,
            self.pointer,
            self.x / surface.width,
            self.y / surface.height,
            self.ms,
        )
        .with_pressure(self.pressure)
        .with_contact(
            self.minor / surface.width,
            self.major / surface.width,
            self.orientation,
        )
        .with_raw(self.x, self.y)
    }
}

pub fn parse_trace_file(path: &Path) -> Result<Vec<TraceRow>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut lines = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line =
            line.with_context(|| format!("failed to read {}:{}", path.display(), line_no + 1))?;
        lines.push(line);
    }
    parse_trace(&lines.join("\n")).with_context(|| format!("invalid trace {}", path.display()))
}

pub fn parse_trace(raw: &str) -> Result<Vec<TraceRow>> {
    let mut rows = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        let line_no = line_no + 1;
        let trimmed = line.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed == TRACE_HEADER
            || trimmed == TRACE_HEADER_FULL
        {
            continue;
        }

        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if parts[0] != "touch_trace" {
            continue;
        }
        if parts.len() != 6 && parts.len() != 10 {
            bail!(
                "line {line_no}: expected 6 or 10 columns, got {}",
                parts.len()
            );
        }

        let kind = EventKind::from_label(parts[2])
            .ok_or_else(|| anyhow!("line {line_no}: invalid kind '{}'", parts[2]))?;
        let mut row = TraceRow {
            ms: parse_field(parts[1], line_no, "ms")?,
            kind,
            pointer: parse_field(parts[3], line_no, "pointer")?,
            x: parse_field(parts[4], line_no, "x")?,
            y: parse_field(parts[5], line_no, "y")?,
            pressure: 0.0,
            minor: 0.0,
            major: 0.0,
            orientation: 0.0,
        };
        if parts.len() == 10 {
            row.pressure = parse_field(parts[6], line_no, "pressure")?;
            row.minor = parse_field(parts[7], line_no, "minor")?;
            row.major = parse_field(parts[8], line_no, "major")?;
            row.orientation = parse_field(parts[9], line_no, "orientation")?;
        }
        rows.push(row);
    }
    Ok(rows)
}

fn parse_field<T>(raw: &str, line_no: usize, field: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .with_context(|| format!("line {line_no}: invalid {field} '{raw}'"))
}

/// Reads `kind:interactor` lines; blanks and `#` comments are skipped.
pub fn parse_expected(raw: &str) -> Result<Vec<String>> {
    let mut decisions = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        let token = line.trim();
        if token.is_empty() || token.starts_with('#') {
            continue;
        }
        let Some((kind, interactor)) = token.split_once(':') else {
            bail!("line {}: expected kind:interactor, got '{token}'", line_no + 1);
        };
        let kind = kind.trim().to_ascii_lowercase();
        if !matches!(kind.as_str(), "promote" | "exclude" | "determine") {
            bail!("line {}: invalid decision kind '{kind}'", line_no + 1);
        }
        decisions.push(format!("{kind}:{}", interactor.trim()));
    }
    Ok(decisions)
}
