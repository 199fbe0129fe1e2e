//! Tesseract-backed [`PageRecognizer`].
//!
//! Each page image is PNG-encoded into a temp file and handed to the
//! `tesseract` CLI (`tesseract page.png stdout -l eng --dpi 200`). PNG keeps
//! glyph edges lossless, which matters more to OCR accuracy than file size.
//! The temp file is removed when the call returns.

use crate::error::AcquisitionError;
use crate::pipeline::acquire::PageRecognizer;
use image::DynamicImage;
use std::io::{Cursor, Write};
use std::process::Command;
use tracing::debug;

/// Runs the `tesseract` binary on each page.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    /// Binary name or path.
    pub binary: String,
    /// Language code(s), e.g. `eng` or `eng+deu`.
    pub language: String,
    /// Resolution hint matching the rasterisation DPI.
    pub dpi: u32,
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: "eng".to_string(),
            dpi: 200,
        }
    }
}

impl TesseractRecognizer {
    pub fn new(binary: impl Into<String>, language: impl Into<String>, dpi: u32) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
            dpi,
        }
    }

    /// Whether the configured binary can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

/// PNG-encode a page image.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!("Encoded page → {} bytes PNG", buf.len());
    Ok(buf)
}

fn recognition_error(detail: impl Into<String>) -> AcquisitionError {
    // Page number is filled in by `recognize_pages`.
    AcquisitionError::Recognition {
        page: 0,
        detail: detail.into(),
    }
}

impl PageRecognizer for TesseractRecognizer {
    fn recognize(&self, page: &DynamicImage) -> Result<String, AcquisitionError> {
        let png = encode_png(page).map_err(|e| recognition_error(format!("PNG encode: {e}")))?;

        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .map_err(|e| recognition_error(format!("temp file: {e}")))?;
        tmp.write_all(&png)
            .and_then(|_| tmp.flush())
            .map_err(|e| recognition_error(format!("temp file write: {e}")))?;

        let output = Command::new(&self.binary)
            .arg(tmp.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--dpi")
            .arg(self.dpi.to_string())
            .output()
            .map_err(|e| {
                recognition_error(format!(
                    "failed to run tesseract (is it installed? path='{}'): {e}",
                    self.binary
                ))
            })?;

        if !output.status.success() {
            return Err(recognition_error(format!(
                "tesseract exited with code {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
