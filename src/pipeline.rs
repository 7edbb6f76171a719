use crate::category::{self, Category, CategoryRules, HelmetRule};
use crate::cli::Args;
use crate::config;
use crate::dedup::TemporalDeduplicator;
use crate::detect::{self, BBox, RawDetection};
use crate::report::{self, Event, ReportBuilder, ReportDocument};
use crate::sampling::FrameSampler;
use anyhow::{Result, anyhow, bail};
use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use usls::{Annotator, DataLoader, Style, Viewer, models::YOLO};

/// The per-run detection policy: which frames are sampled, how raw
/// detections map to categories, and which candidates survive temporal
/// deduplication into the report.
pub struct FramePipeline {
    sampler: FrameSampler,
    rules: CategoryRules,
    helmet: Option<HelmetRule>,
    dedup: TemporalDeduplicator,
    builder: ReportBuilder,
    fps: f64,
}

impl FramePipeline {
    pub fn new(
        video_file: &str,
        categories: &[Category],
        fps: f64,
        stride: usize,
        window_secs: f64,
        min_confidence: f32,
        legacy: bool,
    ) -> Self {
        let helmet = categories
            .contains(&Category::NoHelmet)
            .then(HelmetRule::default);
        Self {
            sampler: FrameSampler::new(stride),
            rules: CategoryRules::for_categories(categories),
            helmet,
            dedup: TemporalDeduplicator::new(window_secs, min_confidence),
            builder: ReportBuilder::new(video_file, categories, legacy),
            fps,
        }
    }

    /// Whether the detector should run on this frame at all.
    pub fn wants_frame(&self, frame_index: usize) -> bool {
        self.sampler.is_sampled(frame_index)
    }

    /// Runs classification and deduplication over one sampled frame's raw
    /// detections and returns the events accepted for that frame.
    pub fn ingest(&mut self, frame_index: usize, detections: &[RawDetection]) -> Vec<Event> {
        let timestamp_secs = frame_index as f64 / self.fps;
        let candidates = category::classify_frame(detections, &self.rules, self.helmet.as_ref());
        let events: Vec<Event> = candidates
            .iter()
            .filter_map(|candidate| self.dedup.submit(candidate, timestamp_secs))
            .collect();
        self.builder.record_frame(timestamp_secs, events.clone());
        events
    }

    pub fn event_count(&self) -> usize {
        self.builder.event_count()
    }

    /// Finalizes the report once the frame loop is done.
    pub fn finish(self, total_frames: usize) -> ReportDocument {
        let duration_seconds = if self.fps > 0.0 {
            total_frames as f64 / self.fps
        } else {
            0.0
        };
        self.builder.finish(duration_seconds)
    }
}

/// Creates a timestamped output directory under `base` and returns its path
fn create_output_dir(base: &Path) -> Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let output_dir = base.join(timestamp);
    fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

/// Decides where the report and, when visualizing, the annotated video go.
/// The timestamped run directory is only created when something will
/// actually be written into it.
fn resolve_output_paths(
    base: &Path,
    output: &str,
    visualize: bool,
) -> Result<(PathBuf, Option<PathBuf>)> {
    if output.is_empty() || visualize {
        let run_dir = create_output_dir(base)?;
        let report_path = if output.is_empty() {
            run_dir.join("detections.json")
        } else {
            PathBuf::from(output)
        };
        Ok((report_path, Some(run_dir)))
    } else {
        Ok((PathBuf::from(output), None))
    }
}

/// Processes a video end to end and writes the JSON report.
pub fn run(args: &Args) -> Result<()> {
    let source = Path::new(&args.source);
    if !source.is_file() {
        bail!("input video not found: {}", source.display());
    }
    let video_file = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.source.clone());

    let categories = if args.legacy_format {
        // The legacy shape only ever carried garbage detections.
        vec![Category::Garbage]
    } else {
        Category::parse_list(&args.categories)?
    };

    let (report_path, run_dir) =
        resolve_output_paths(Path::new("./runs"), &args.output, args.visualize)?;

    println!("Loading detector model...");
    let config = config::build_config(args)?;
    let mut model = YOLO::new(config.commit()?)
        .map_err(|e| anyhow!("failed to load detector model: {e}"))?;

    println!("Processing video: {}", source.display());
    let data_loader = DataLoader::new(&args.source)
        .map_err(|e| anyhow!("could not open video {}: {e}", source.display()))?
        .with_batch(model.batch() as _)
        .build()
        .map_err(|e| anyhow!("could not read video stream {}: {e}", source.display()))?;

    let frame_rate = data_loader.frame_rate();
    let fps = frame_rate as f64;
    println!("Video frame rate: {}", frame_rate);

    let mut viewer = match &run_dir {
        Some(run_dir) if args.visualize => {
            let stem = source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "video".to_string());
            let annotated = run_dir.join(format!("{stem}_detections.mp4"));
            println!("Annotated video will be saved to: {}", annotated.display());
            Some(
                Viewer::default()
                    .with_fps(frame_rate)
                    .with_saveout(annotated.to_string_lossy().into_owned()),
            )
        }
        _ => None,
    };

    let annotator = Annotator::default().with_hbb_style(
        Style::hbb()
            .with_draw_fill(true)
            .with_palette(&usls::Color::palette_coco_80()),
    );

    let mut pipeline = FramePipeline::new(
        &video_file,
        &categories,
        fps,
        args.stride,
        args.dedup_window,
        args.confidence,
        args.legacy_format,
    );

    let mut frame_index = 0usize;
    for images in data_loader {
        for image in images.iter() {
            if pipeline.wants_frame(frame_index) {
                print!(
                    "Progress: {}\r",
                    report::format_timestamp(frame_index as f64 / fps)
                );
                let _ = std::io::stdout().flush();

                let ys = model.forward(&[image.clone()])?;
                let raw = detect::raw_detections(&ys[0]);
                log::debug!("frame {}: {} raw detections", frame_index, raw.len());

                let events = pipeline.ingest(frame_index, &raw);

                if let Some(viewer) = viewer.as_mut() {
                    let frame = if events.is_empty() {
                        image.clone()
                    } else {
                        // Burn in only the accepted events, not every box
                        // the detector saw on the frame.
                        let boxes: Vec<BBox> =
                            events.iter().filter_map(|e| e.bounding_box).collect();
                        let overlay = detect::event_overlay(&ys[0], &boxes);
                        annotator.annotate(image, &overlay)?
                    };
                    viewer.write_video_frame(&frame)?;
                }
            } else if let Some(viewer) = viewer.as_mut() {
                viewer.write_video_frame(image)?;
            }
            frame_index += 1;
        }
    }

    if let Some(viewer) = viewer.as_mut() {
        viewer.finalize_video()?;
    }

    println!();
    println!("Processed {} frames", frame_index);
    println!("Found {} events", pipeline.event_count());

    let document = pipeline.finish(frame_index);
    document.write(&report_path)?;
    println!("Results saved to {}", report_path.display());

    Ok(())
}
