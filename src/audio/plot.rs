//! Spectrogram graphing
//!
//! Sample spectrograms produced during training are handed to a `Grapher`.
//! Failures here are never fatal to training.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use ndarray::Array2;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Edge length in pixels of one (frame, bin) cell in a PNG graph
pub const PNG_CELL_PX: u32 = 4;

/// On-disk format for sample graphs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotFormat {
    Csv,
    #[default]
    Png,
}

/// Grapher writing into `dir` in `format`, or a `LogGrapher` when there is no directory
pub fn grapher_for(dir: Option<&str>, format: PlotFormat) -> Box<dyn Grapher> {
    match (dir, format) {
        (Some(dir), PlotFormat::Csv) => Box::new(CsvGrapher::new(dir)),
        (Some(dir), PlotFormat::Png) => Box::new(PngGrapher::new(dir)),
        (None, _) => Box::new(LogGrapher),
    }
}

/// Renders a 2D representation under a title
pub trait Grapher {
    fn graph(&self, data: &Array2<f32>, title: &str) -> Result<()>;
}

/// Writes each graph as a CSV grid (one row per frame) named after the title
#[derive(Debug, Clone)]
pub struct CsvGrapher {
    dir: PathBuf,
}

impl CsvGrapher {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// File a given title is written to
    pub fn path_for(&self, title: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", slugify(title)))
    }
}

impl Grapher for CsvGrapher {
    fn graph(&self, data: &Array2<f32>, title: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create plot directory {}", self.dir.display()))?;

        let path = self.path_for(title);
        let mut writer = csv::Writer::from_path(&path)?;
        for row in data.rows() {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush()?;

        info!("Saved '{}' to {}", title, path.display());
        Ok(())
    }
}

/// Renders each graph as a heat-map PNG named after the title.
///
/// Frames run left to right and frequency bins bottom to top, so low
/// frequencies sit at the bottom of the image. Values are min-max normalised
/// per graph before colouring.
#[derive(Debug, Clone)]
pub struct PngGrapher {
    dir: PathBuf,
}

impl PngGrapher {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// File a given title is written to
    pub fn path_for(&self, title: &str) -> PathBuf {
        self.dir.join(format!("{}.png", slugify(title)))
    }
}

impl Grapher for PngGrapher {
    fn graph(&self, data: &Array2<f32>, title: &str) -> Result<()> {
        let (frames, bins) = data.dim();
        if frames == 0 || bins == 0 {
            bail!("cannot graph '{}': empty {}x{} grid", title, frames, bins);
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create plot directory {}", self.dir.display()))?;

        let min = data.iter().copied().fold(f32::INFINITY, f32::min);
        let max = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let range = max - min;

        let path = self.path_for(title);
        let cell = PNG_CELL_PX as i32;
        let size = (frames as u32 * PNG_CELL_PX, bins as u32 * PNG_CELL_PX);
        let root = BitMapBackend::new(&path, size).into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("backend error: {e}"))?;

        for ((f, k), &value) in data.indexed_iter() {
            let norm = if range > 0.0 { (value - min) / range } else { 0.0 };
            let x = f as i32 * cell;
            let y = (bins - 1 - k) as i32 * cell;
            let rect = Rectangle::new(
                [(x, y), (x + cell - 1, y + cell - 1)],
                gradient_color(norm).filled(),
            );
            root.draw(&rect).map_err(|e| anyhow!("draw error: {e}"))?;
        }

        root.present().map_err(|e| anyhow!("render error: {e}"))?;

        info!("Saved '{}' to {}", title, path.display());
        Ok(())
    }
}

/// Blue for the minimum through green to red for the maximum
fn gradient_color(norm: f32) -> RGBColor {
    let clamped = norm.clamp(0.0, 1.0);
    let r = (255.0 * clamped) as u8;
    let g = (255.0 * (1.0 - (clamped - 0.5).abs() * 2.0).max(0.0)) as u8;
    let b = (255.0 * (1.0 - clamped)) as u8;
    RGBColor(r, g, b)
}

/// Logs summary statistics instead of rendering
#[derive(Debug, Clone, Copy, Default)]
pub struct LogGrapher;

impl Grapher for LogGrapher {
    fn graph(&self, data: &Array2<f32>, title: &str) -> Result<()> {
        let min = data.iter().copied().fold(f32::INFINITY, f32::min);
        let max = data.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mean = data.mean().unwrap_or(0.0);
        info!(
            "{}: shape {:?}, min {:.2}, max {:.2}, mean {:.2}",
            title,
            data.shape(),
            min,
            max,
            mean
        );
        Ok(())
    }
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Generated Audio 1 epoch 5"), "generated_audio_1_epoch_5");
        assert_eq!(slugify("  a--b  "), "a_b");
    }

    #[test]
    fn test_csv_grapher_writes_grid() {
        let dir = tempfile::tempdir().unwrap();
        let grapher = CsvGrapher::new(dir.path().join("plots"));

        let data = Array2::from_shape_fn((3, 4), |(f, k)| (f * 4 + k) as f32);
        grapher.graph(&data, "Generated Audio 1 epoch 2").unwrap();

        let content = std::fs::read_to_string(grapher.path_for("Generated Audio 1 epoch 2")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2], "8,9,10,11");
    }

    #[test]
    fn test_png_grapher_writes_image() {
        let dir = tempfile::tempdir().unwrap();
        let grapher = PngGrapher::new(dir.path().join("plots"));

        let data = Array2::from_shape_fn((4, 3), |(f, k)| (f * 3 + k) as f32);
        grapher.graph(&data, "Generated Audio 1 epoch 2").unwrap();

        let path = grapher.path_for("Generated Audio 1 epoch 2");
        assert_eq!(path.extension().unwrap(), "png");
        let bytes = std::fs::read(path).unwrap();
        assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n"));
    }

    #[test]
    fn test_png_grapher_handles_flat_grid() {
        let dir = tempfile::tempdir().unwrap();
        let grapher = PngGrapher::new(dir.path());

        let data = Array2::from_elem((2, 2), -120.0f32);
        assert!(grapher.graph(&data, "silence").is_ok());
        assert!(grapher.path_for("silence").exists());
    }

    #[test]
    fn test_png_grapher_rejects_empty_grid() {
        let dir = tempfile::tempdir().unwrap();
        let grapher = PngGrapher::new(dir.path());

        let data = Array2::<f32>::zeros((0, 3));
        assert!(grapher.graph(&data, "empty").is_err());
        assert!(!grapher.path_for("empty").exists());
    }

    #[test]
    fn test_gradient_color_endpoints() {
        assert_eq!(gradient_color(0.0), RGBColor(0, 0, 255));
        assert_eq!(gradient_color(1.0), RGBColor(255, 0, 0));
        assert_eq!(gradient_color(0.5).1, 255);
    }

    #[test]
    fn test_grapher_for_picks_format() {
        let dir = tempfile::tempdir().unwrap();
        let data = Array2::from_shape_fn((2, 2), |(f, k)| (f + k) as f32);
        let dir_str = dir.path().to_str().unwrap();

        grapher_for(Some(dir_str), PlotFormat::Csv).graph(&data, "a").unwrap();
        grapher_for(Some(dir_str), PlotFormat::Png).graph(&data, "b").unwrap();
        grapher_for(None, PlotFormat::Png).graph(&data, "c").unwrap();

        assert!(dir.path().join("a.csv").exists());
        assert!(dir.path().join("b.png").exists());
        assert!(!dir.path().join("c.png").exists());
    }

    #[test]
    fn test_log_grapher_succeeds() {
        let data = Array2::<f32>::zeros((2, 2));
        assert!(LogGrapher.graph(&data, "empty").is_ok());
    }
}
