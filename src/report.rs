use crate::category::{Candidate, Category};
use crate::detect::BBox;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Formats a duration in seconds as `H:MM:SS`, truncating fractional seconds.
pub fn format_timestamp(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// One accepted, deduplicated occurrence of a category. Immutable once
/// created; owned by the report builder for the remainder of the run.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub category: Category,
    pub class_label: String,
    pub confidence: f32,
    pub timestamp_seconds: f64,
    pub timestamp: String,
    pub bounding_box: Option<BBox>,
}

impl Event {
    pub fn new(candidate: &Candidate, timestamp_secs: f64) -> Self {
        Self {
            category: candidate.category,
            class_label: candidate.label.clone(),
            confidence: candidate.confidence,
            timestamp_seconds: timestamp_secs,
            timestamp: format_timestamp(timestamp_secs),
            bounding_box: Some(candidate.bbox),
        }
    }
}

/// One event as serialized inside a frame group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportEvent {
    pub category: Category,
    #[serde(rename = "class")]
    pub class_label: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BBox>,
}

/// All events accepted from a single sampled frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameGroup {
    pub timestamp: String,
    pub detections: Vec<ReportEvent>,
}

/// Multi-category report shape. Field order is the serialized key order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub video_file: String,
    pub duration_seconds: f64,
    pub duration: String,
    pub detection_summary: BTreeMap<Category, usize>,
    pub detections: Vec<FrameGroup>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegacyDetection {
    pub timestamp_seconds: f64,
    pub timestamp: String,
    pub confidence: f32,
    #[serde(rename = "class")]
    pub class_label: String,
}

/// Single-category legacy report shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LegacyReport {
    pub video_file: String,
    pub duration_seconds: f64,
    pub duration: String,
    pub garbage_detections: Vec<LegacyDetection>,
}

/// A finished report in either output shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportDocument {
    Multi(Report),
    Legacy(LegacyReport),
}

impl ReportDocument {
    /// Serializes the report to UTF-8 JSON. The artifact is written exactly
    /// once per run, after the frame loop has finished.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }
}

/// Accumulates accepted events, grouped by sampled frame, together with the
/// running per-category counters for the summary.
pub struct ReportBuilder {
    video_file: String,
    legacy: bool,
    summary: BTreeMap<Category, usize>,
    groups: Vec<(f64, Vec<Event>)>,
}

impl ReportBuilder {
    pub fn new(video_file: &str, categories: &[Category], legacy: bool) -> Self {
        Self {
            video_file: video_file.to_string(),
            legacy,
            summary: categories.iter().map(|c| (*c, 0)).collect(),
            groups: Vec::new(),
        }
    }

    /// Records the events accepted from one sampled frame. Frames with no
    /// accepted events produce no group.
    pub fn record_frame(&mut self, timestamp_secs: f64, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        for event in &events {
            *self.summary.entry(event.category).or_insert(0) += 1;
        }
        self.groups.push((timestamp_secs, events));
    }

    pub fn event_count(&self) -> usize {
        self.summary.values().sum()
    }

    /// Finalizes the report with the video duration.
    pub fn finish(self, duration_seconds: f64) -> ReportDocument {
        let duration = format_timestamp(duration_seconds);
        if self.legacy {
            let garbage_detections = self
                .groups
                .into_iter()
                .flat_map(|(_, events)| events)
                .filter(|e| e.category == Category::Garbage)
                .map(|e| LegacyDetection {
                    timestamp_seconds: e.timestamp_seconds,
                    timestamp: e.timestamp,
                    confidence: e.confidence,
                    class_label: e.class_label,
                })
                .collect();
            ReportDocument::Legacy(LegacyReport {
                video_file: self.video_file,
                duration_seconds,
                duration,
                garbage_detections,
            })
        } else {
            let detections = self
                .groups
                .into_iter()
                .map(|(timestamp_secs, events)| FrameGroup {
                    timestamp: format_timestamp(timestamp_secs),
                    detections: events
                        .into_iter()
                        .map(|e| ReportEvent {
                            category: e.category,
                            class_label: e.class_label,
                            confidence: e.confidence,
                            bounding_box: e.bounding_box,
                        })
                        .collect(),
                })
                .collect();
            ReportDocument::Multi(Report {
                video_file: self.video_file,
                duration_seconds,
                duration,
                detection_summary: self.summary,
                detections,
            })
        }
    }
}

/// Prints a human-readable summary of a previously produced report.
///
/// Consumption is lenient where production is strict: fields missing from
/// the file fall back to defaults instead of failing, so reports from older
/// runs stay inspectable.
pub fn print_summary(path: &Path) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("could not read report {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("report {} is not valid JSON", path.display()))?;
    print!("{}", summarize(&value));
    Ok(())
}

fn summarize(value: &Value) -> String {
    let mut out = String::new();
    let video = value
        .get("video_file")
        .and_then(Value::as_str)
        .unwrap_or("Unknown");
    let duration = value
        .get("duration")
        .and_then(Value::as_str)
        .unwrap_or("Unknown");
    out.push_str(&format!("Video: {video}\n"));
    out.push_str(&format!("Duration: {duration}\n"));

    if let Some(frames) = value.get("detections").and_then(Value::as_array) {
        if let Some(summary) = value.get("detection_summary").and_then(Value::as_object) {
            out.push_str("Detection summary:\n");
            for (category, count) in summary {
                let count = count.as_u64().unwrap_or(0);
                out.push_str(&format!("- {category}: {count} events\n"));
            }
        }
        out.push_str(&format!("Frames with detections: {}\n", frames.len()));
        for frame in frames {
            let timestamp = frame
                .get("timestamp")
                .and_then(Value::as_str)
                .unwrap_or("Unknown");
            let items = frame
                .get("detections")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            out.push_str(&format!("{timestamp} - {} items:\n", items.len()));
            for item in &items {
                let category = item
                    .get("category")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown");
                let class = item.get("class").and_then(Value::as_str).unwrap_or("Unknown");
                let confidence = item
                    .get("confidence")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                out.push_str(&format!("  - {category}: {class} ({confidence:.2})\n"));
            }
        }
    } else {
        let detections = value
            .get("garbage_detections")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        out.push_str(&format!("Garbage detections: {}\n", detections.len()));
        for detection in &detections {
            let timestamp = detection
                .get("timestamp")
                .and_then(Value::as_str)
                .unwrap_or("Unknown");
            let class = detection
                .get("class")
                .and_then(Value::as_str)
                .unwrap_or("Unknown");
            let confidence = detection
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            out.push_str(&format!("{timestamp} - {class} ({confidence:.2})\n"));
        }
    }

    out
}
