mod lines;
mod tesseract;

use anyhow::Result;

pub use lines::{DEFAULT_LINE_THRESHOLD, MenuLine, reconstruct_lines};
pub use tesseract::{TesseractOcr, list_tesseract_languages};

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BBoxPx {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// One recognised word or phrase with its position and confidence.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Detection {
    pub bbox: BBoxPx,
    pub text: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(text: impl Into<String>, x: f32, y: f32) -> Self {
        Self {
            bbox: BBoxPx {
                x,
                y,
                w: 0.0,
                h: 0.0,
            },
            text: text.into(),
            confidence: 1.0,
        }
    }

    pub fn top(&self) -> f32 {
        self.bbox.y
    }
}

/// Text detection over a raster image. Detections are returned in whatever
/// order the engine reports them.
pub trait OcrEngine: Send + Sync {
    fn detect(&self, image: &[u8]) -> Result<Vec<Detection>>;
}
