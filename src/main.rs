use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use serde::Deserialize;

use overmark::{
    load_canvas_config, Canvas, ExportOptions, Overlay, OverlayId, OverlayKind, OverlayStyle,
    Point, Rect,
};

#[derive(Parser, Debug)]
#[command(name = "overmark")]
#[command(version, about = "Flatten annotations onto an image")]
struct Cli {
    /// Base image to annotate
    image: PathBuf,

    /// JSON file describing the overlays
    annotations: PathBuf,

    /// Output file; the format follows the extension
    output: PathBuf,

    /// Pixel density of the base image (pixels per point)
    #[arg(long, value_name = "FACTOR")]
    density: Option<f64>,

    /// Fill uncovered export pixels with white
    #[arg(long, action = ArgAction::SetTrue)]
    opaque: bool,
}

/// Contents of the annotations file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AnnotationFile {
    pixel_density: Option<f64>,
    overlays: Vec<AnnotationEntry>,
    crop: Option<Rect>,
    opaque: bool,
}

#[derive(Debug, Deserialize)]
struct AnnotationEntry {
    kind: OverlayKind,
    #[serde(default)]
    frame: Option<Rect>,
    #[serde(default)]
    start: Option<Point>,
    #[serde(default)]
    end: Option<Point>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    style: Option<OverlayStyle>,
}

impl AnnotationEntry {
    fn into_overlay(self, template: &OverlayStyle) -> Result<Overlay> {
        let style = self.style.unwrap_or_else(|| template.clone());
        let id = OverlayId(0);
        if self.kind.is_segment() {
            let (Some(start), Some(end)) = (self.start, self.end) else {
                bail!("{} overlay needs `start` and `end`", self.kind.label());
            };
            return Ok(Overlay::segment(id, self.kind, start, end, style));
        }
        let Some(frame) = self.frame else {
            bail!("{} overlay needs a `frame`", self.kind.label());
        };
        match self.kind {
            OverlayKind::Text => {
                let text = self.text.context("text overlay needs `text`")?;
                Ok(Overlay::text(id, frame, text, style))
            }
            kind => Ok(Overlay::with_frame(id, kind, frame, style)),
        }
    }
}

fn read_annotations(path: &Path) -> Result<AnnotationFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("invalid annotations file {}", path.display()))
}

fn run(cli: Cli) -> Result<()> {
    let annotations = read_annotations(&cli.annotations)?;
    let mut canvas = Canvas::new(load_canvas_config());

    let density = cli.density.or(annotations.pixel_density).unwrap_or(1.0);
    canvas
        .load_base_image(&cli.image, density)
        .with_context(|| format!("failed to load {}", cli.image.display()))?;

    let template = canvas.style_template().clone();
    for (index, entry) in annotations.overlays.into_iter().enumerate() {
        let overlay = entry
            .into_overlay(&template)
            .with_context(|| format!("overlay #{index}"))?;
        canvas.add_overlay(overlay);
    }
    if annotations.crop.is_some() {
        canvas.set_crop(annotations.crop)?;
    }

    let options = ExportOptions {
        opaque: cli.opaque || annotations.opaque,
    };
    canvas
        .export_to_path(&cli.output, options)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    tracing::info!(
        overlays = canvas.document().overlays().len(),
        output = %cli.output.display(),
        "annotations flattened"
    );
    Ok(())
}

fn main() -> Result<()> {
    overmark::logging::init();
    run(Cli::parse())
}
