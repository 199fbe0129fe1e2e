//! pdfium-backed [`PdfBackend`]: native text layer and page rasterisation.
//!
//! pdfium is a C++ library with thread-local state; every call here is
//! blocking and is expected to run on Tokio's blocking pool.
//!
//! Binding order: `PDFIUM_LIB_PATH` (a library file or the directory holding
//! it), then the system library search path.

use crate::error::AcquisitionError;
use crate::pipeline::acquire::PdfBackend;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// Points per inch in PDF user space.
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// [`PdfBackend`] built on pdfium-render.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfiumBackend;

impl PdfiumBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Bind to a pdfium shared library.
pub fn bind_pdfium() -> Result<Pdfium, AcquisitionError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let path = Path::new(&p);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(path)
            } else {
                path.to_path_buf()
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(lib)
        }
        _ => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| AcquisitionError::Binding(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

fn load_error(e: PdfiumError) -> AcquisitionError {
    let detail = format!("{e:?}");
    if detail.contains("Password") || detail.contains("password") {
        AcquisitionError::PasswordRequired
    } else {
        AcquisitionError::Unparsable(detail)
    }
}

/// Scale factor from PDF points to pixels at `dpi`.
pub fn scale_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / PDF_POINTS_PER_INCH
}

impl PdfBackend for PdfiumBackend {
    fn page_texts(
        &self,
        bytes: &[u8],
        password: Option<&str>,
    ) -> Result<Vec<String>, AcquisitionError> {
        let pdfium = bind_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(load_error)?;

        let mut texts = Vec::new();
        for (idx, page) in document.pages().iter().enumerate() {
            // A page whose text layer cannot be read counts as empty; the
            // document as a whole may still have enough text elsewhere.
            let text = page.text().map(|t| t.all()).unwrap_or_default();
            debug!("Page {}: {} chars of native text", idx + 1, text.len());
            texts.push(text);
        }
        info!("Read text layer of {} pages", texts.len());
        Ok(texts)
    }

    fn rasterize(
        &self,
        bytes: &[u8],
        dpi: u32,
        password: Option<&str>,
    ) -> Result<Vec<DynamicImage>, AcquisitionError> {
        let pdfium = bind_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, password)
            .map_err(load_error)?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(scale_for_dpi(dpi));

        let mut images = Vec::new();
        for (idx, page) in document.pages().iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                AcquisitionError::Rasterisation {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                }
            })?;
            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            images.push(image);
        }
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_matches_dpi() {
        assert_eq!(scale_for_dpi(72), 1.0);
        assert!((scale_for_dpi(200) - 2.777_777_8).abs() < 1e-4);
    }
}
