//! Parsing of the transcoder's diagnostic stream.
//!
//! Progress lines look like
//! `frame=100 size=512kB time=00:00:05.00 bitrate=838.9kbits/s speed=1.2x`
//! and are rewritten in place with carriage returns, so the stream is split
//! on both `\r` and `\n`. Everything here is best-effort: a line without a
//! usable marker is ignored, never reported as an error.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

static TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"time=\s*(\d+:\d{2}:\d{2}(?:\.\d+)?)").expect("time pattern is valid")
});
static SIZE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"size=\s*(\S+)").expect("size pattern is valid"));
static SPEED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"speed=\s*(\S+)").expect("speed pattern is valid"));

/// One progress update extracted from a diagnostic line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSample {
    /// Media time encoded so far
    pub elapsed: Duration,
    /// Output size as printed, e.g. `512kB`
    pub size_label: Option<String>,
    /// Output size in bytes when the label could be interpreted
    pub size_bytes: Option<u64>,
    /// Encoding speed relative to real time
    pub speed_factor: Option<f64>,
}

/// Extracts a progress sample from one line; requires a `time=` marker.
pub fn parse_progress_line(line: &str) -> Option<ProgressSample> {
    let time_label = TIME_PATTERN.captures(line)?.get(1)?.as_str();
    let elapsed = parse_timestamp(time_label)?;

    let size_label = capture_value(&SIZE_PATTERN, line);
    let size_bytes = size_label.as_deref().and_then(parse_size_label);
    let speed_factor = capture_value(&SPEED_PATTERN, line)
        .as_deref()
        .and_then(parse_speed_label);

    Some(ProgressSample {
        elapsed,
        size_label,
        size_bytes,
        speed_factor,
    })
}

/// Parses `HH:MM:SS(.frac)` into a duration.
pub fn parse_timestamp(text: &str) -> Option<Duration> {
    let mut parts = text.trim().split(':');
    let hours: u64 = parts.next()?.parse().ok()?;
    let minutes: u64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(Duration::from_secs(hours * 3600 + minutes * 60) + Duration::from_secs_f64(seconds))
}

/// Interprets size labels such as `512kB`, `1.5MiB` or `2048B`.
///
/// The transcoder's `kB` is 1024 bytes.
pub fn parse_size_label(label: &str) -> Option<u64> {
    let label = label.trim();
    let split = label
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(label.len());
    let (number, unit) = label.split_at(split);
    let value: f64 = number.parse().ok()?;

    let multiplier: f64 = match unit {
        "" | "B" => 1.0,
        "kB" | "KB" | "KiB" => 1024.0,
        "mB" | "MB" | "MiB" => 1024.0 * 1024.0,
        "gB" | "GB" | "GiB" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };

    Some((value * multiplier).round() as u64)
}

fn parse_speed_label(label: &str) -> Option<f64> {
    let factor: f64 = label.trim().strip_suffix('x')?.parse().ok()?;
    factor.is_finite().then_some(factor)
}

fn capture_value(pattern: &Regex, line: &str) -> Option<String> {
    pattern
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|value| !value.eq_ignore_ascii_case("N/A"))
        .map(str::to_string)
}

/// Last size, time and speed labels seen in the stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySummary {
    pub size: Option<String>,
    pub time: Option<String>,
    pub speed: Option<String>,
}

impl TelemetrySummary {
    /// Updates each field the line carries; absent markers keep the old value.
    pub fn observe(&mut self, line: &str) {
        if let Some(size) = capture_value(&SIZE_PATTERN, line) {
            self.size = Some(size);
        }
        if let Some(time) = TIME_PATTERN
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
        {
            self.time = Some(time);
        }
        if let Some(speed) = capture_value(&SPEED_PATTERN, line) {
            self.speed = Some(speed);
        }
    }
}

/// Splits a byte stream into lines on `\r` or `\n`.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    /// Feeds a chunk and returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Returns the unterminated remainder, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

/// Diagnostic text retained for error reports, plus the running summary.
///
/// Lines are kept verbatim, one per `\n`; once `capacity` bytes are
/// exceeded the oldest text is discarded.
#[derive(Debug)]
pub struct DiagnosticLog {
    text: String,
    capacity: usize,
    truncated: bool,
    summary: TelemetrySummary,
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            text: String::new(),
            capacity: capacity.max(1),
            truncated: false,
            summary: TelemetrySummary::default(),
        }
    }

    /// Records one line and returns the progress sample it carries, if any.
    pub fn record_line(&mut self, line: &str) -> Option<ProgressSample> {
        if line.trim().is_empty() {
            return None;
        }
        self.retain(line);
        self.summary.observe(line);
        parse_progress_line(line)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn summary(&self) -> &TelemetrySummary {
        &self.summary
    }

    fn retain(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');

        if self.text.len() > self.capacity {
            let mut cut = self.text.len() - self.capacity;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            self.text.drain(..cut);
            self.truncated = true;
        }
    }
}
