use argh::FromArgs;

/// Detect roadside events (garbage, potholes, broken road surface, riders
/// without helmets) in a video file and write a timestamped JSON report
#[derive(FromArgs, Debug)]
pub struct Args {
    /// path to the input video file (or to a report JSON when --inspect is set)
    #[argh(positional)]
    pub source: String,

    /// path to save the JSON report (default: ./runs/<timestamp>/detections.json)
    #[argh(option, short = 'o', default = "String::new()")]
    pub output: String,

    /// confidence threshold for detections
    #[argh(option, short = 'c', default = "0.5")]
    pub confidence: f32,

    /// comma-separated categories: garbage, pothole, broken_road, no_helmet (default: all)
    #[argh(option, default = "String::new()")]
    pub categories: String,

    /// frame sampling stride: run the detector on every Nth frame
    #[argh(option, default = "5")]
    pub stride: usize,

    /// deduplication window in seconds
    #[argh(option, default = "1.0")]
    pub dedup_window: f64,

    /// write an annotated copy of the video next to the report
    #[argh(switch)]
    pub visualize: bool,

    /// emit the legacy garbage-only report shape
    #[argh(switch)]
    pub legacy_format: bool,

    /// print a summary of an existing report instead of processing a video
    #[argh(switch)]
    pub inspect: bool,

    /// model dtype
    #[argh(option, default = "String::from(\"auto\")")]
    pub dtype: String,

    /// model version
    #[argh(option, default = "8.0")]
    pub ver: f32,

    /// device: cuda, cpu, coreml
    #[argh(option, default = "String::from(\"cpu:0\")")]
    pub device: String,

    /// model scale: n, s, m, l
    #[argh(option, default = "String::from(\"n\")")]
    pub scale: String,
}
