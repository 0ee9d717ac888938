use anyhow::{Context, bail};
use clap::Parser;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use pothole_vision::{
    BackendMode, DetectionBox, DetectionOutcome, DetectionParams, DetectionService,
    DetectionSummary, DetectorConfig, OwnedFrame, PotholeDetector, SolidityConfidence,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const BOX_COLOR: Rgba<u8> = Rgba([255, 0, 60, 255]);
const BOX_THICKNESS: u32 = 2;

#[derive(Parser, Debug)]
#[command(name = "visual_tester")]
#[command(about = "Run the pothole detector on a still image and draw what it finds")]
#[command(version)]
struct Cli {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Where to write the annotated copy of the image.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Where to write the detections as JSON.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Detector configuration (JSON). Missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Darkness sensitivity, 0-100. Overrides the config file.
    #[arg(long)]
    sensitivity: Option<f64>,

    /// Minimum pothole size in pixels, 10-100. Overrides the config file.
    #[arg(long)]
    min_size: Option<f64>,

    /// Derive confidence from blob solidity instead of sampling it.
    #[arg(long)]
    deterministic: bool,

    /// ONNX detection model; selects the model backend.
    #[cfg(feature = "onnx")]
    #[arg(long)]
    model: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    image: &'a Path,
    width: u32,
    height: u32,
    mode: BackendMode,
    config: DetectorConfig,
    summary: DetectionSummary,
    detections: Vec<CaptionedDetection<'a>>,
}

/// A detection plus the overlay caption a viewer should draw next to it.
#[derive(Serialize)]
struct CaptionedDetection<'a> {
    #[serde(flatten)]
    detection: &'a DetectionBox,
    caption: String,
}

fn captioned(boxes: &[DetectionBox]) -> Vec<CaptionedDetection<'_>> {
    boxes
        .iter()
        .map(|detection| CaptionedDetection {
            detection,
            caption: detection.overlay_label(),
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Logging & Argument Parsing ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // --- 2. Detector Initialization ---
    let mut detector = PotholeDetector::new(config).context("invalid detector configuration")?;
    if cli.deterministic {
        detector = detector.with_scorer(SolidityConfidence {
            min_solidity: config.limits.min_solidity,
        });
    }
    let service = DetectionService::new(detector);

    attach_model(&cli, &service).await?;

    // --- 3. Image Loading & Detection ---
    let image = image::open(&cli.image)
        .with_context(|| format!("failed to open {}", cli.image.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    log::info!("loaded {} ({}x{})", cli.image.display(), width, height);

    let outcome = service
        .detect(OwnedFrame::from_rgba_image(image.clone()))
        .await
        .context("detection failed")?;
    let boxes = match outcome {
        DetectionOutcome::Completed(boxes) => boxes,
        DetectionOutcome::Superseded(_) => bail!("detection was superseded by another request"),
    };

    // --- 4. Reporting ---
    let summary = DetectionSummary::from_boxes(&boxes);
    for detection in &boxes {
        log::info!(
            "{} at ({:.0}, {:.0}) {:.0}x{:.0}",
            detection.overlay_label(),
            detection.x,
            detection.y,
            detection.w,
            detection.h
        );
    }
    match summary.mean_confidence {
        Some(mean) => log::info!(
            "{} detection(s), mean confidence {:.0}%",
            summary.count,
            mean * 100.0
        ),
        None => log::info!("no potholes detected"),
    }

    if let Some(json_path) = &cli.json {
        let report = Report {
            image: &cli.image,
            width,
            height,
            mode: service.mode().await,
            config: service.config().await,
            summary,
            detections: captioned(&boxes),
        };
        let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
        std::fs::write(json_path, json)
            .with_context(|| format!("failed to write {}", json_path.display()))?;
        log::info!("report saved to {}", json_path.display());
    }

    // --- 5. Visualization ---
    if let Some(out_path) = &cli.out {
        let mut annotated = image;
        draw_boxes(&mut annotated, &boxes);
        annotated
            .save(out_path)
            .with_context(|| format!("failed to write {}", out_path.display()))?;
        log::info!("annotated image saved to {}", out_path.display());
    }

    Ok(())
}

/// Starts from the config file (or defaults) and applies the CLI overrides.
fn load_config(cli: &Cli) -> anyhow::Result<DetectorConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        None => DetectorConfig::default(),
    };

    config.params = DetectionParams {
        sensitivity: cli.sensitivity.unwrap_or(config.params.sensitivity),
        min_size: cli.min_size.unwrap_or(config.params.min_size),
    };
    Ok(config)
}

/// Loads `--model` into the service, which switches it to the model backend.
#[cfg(feature = "onnx")]
async fn attach_model(cli: &Cli, service: &DetectionService) -> anyhow::Result<()> {
    use pothole_vision::backend::ModelBackend;
    use pothole_vision::backend::decode::YoloV8Decoder;

    let Some(model_path) = &cli.model else {
        return Ok(());
    };
    let model = ModelBackend::from_onnx_file(model_path, YoloV8Decoder::default())
        .with_context(|| format!("failed to load model {}", model_path.display()))?;
    service.load_model(model).await;
    Ok(())
}

#[cfg(not(feature = "onnx"))]
async fn attach_model(_cli: &Cli, _service: &DetectionService) -> anyhow::Result<()> {
    Ok(())
}

/// Outlines each detection, thickening the stroke inward.
fn draw_boxes(image: &mut RgbaImage, boxes: &[DetectionBox]) {
    for detection in boxes {
        let (x, y) = (detection.x.round() as i32, detection.y.round() as i32);
        let (w, h) = (detection.w.round() as u32, detection.h.round() as u32);
        for inset in 0..BOX_THICKNESS {
            if w <= inset * 2 || h <= inset * 2 {
                break;
            }
            let rect = Rect::at(x + inset as i32, y + inset as i32).of_size(w - inset * 2, h - inset * 2);
            draw_hollow_rect_mut(image, rect, BOX_COLOR);
        }
    }
}
