use std::path::{Path, PathBuf};

use pdfium_render::prelude::{PdfBitmapFormat, PdfDocument, PdfRenderConfig, Pdfium};
use studyshelf_core::RgbaBitmap;

use crate::{DocumentHandle, RenderEngine};

const MAX_RENDER_HEIGHT: i32 = 12_000;

pub struct PdfiumEngine {
    pdfium: Pdfium,
}

impl PdfiumEngine {
    pub fn new() -> anyhow::Result<Self> {
        if pdfium_disabled() {
            anyhow::bail!("pdfium disabled via STUDYSHELF_DISABLE_PDFIUM");
        }
        let pdfium = bind_pdfium()?;
        log::info!("pdfium bound");
        Ok(Self { pdfium })
    }
}

impl RenderEngine for PdfiumEngine {
    type Handle<'a> = PdfiumDocument<'a>;

    fn open<'a>(&'a self, bytes: Vec<u8>) -> anyhow::Result<PdfiumDocument<'a>> {
        let document = self
            .pdfium
            .load_pdf_from_byte_vec(bytes, None)
            .map_err(|err| anyhow::anyhow!(err))?;
        Ok(PdfiumDocument { document })
    }
}

pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
}

impl DocumentHandle for PdfiumDocument<'_> {
    fn page_count(&self) -> u32 {
        u32::from(self.document.pages().len())
    }

    fn render_page(&self, page: u32, width_px: u32) -> anyhow::Result<RgbaBitmap> {
        let index = page
            .checked_sub(1)
            .and_then(|index| u16::try_from(index).ok())
            .ok_or_else(|| anyhow::anyhow!("page {page} out of range"))?;
        let page = self
            .document
            .pages()
            .get(index)
            .map_err(|err| anyhow::anyhow!(err))?;

        let target_width = i32::try_from(width_px).unwrap_or(i32::MAX).max(1);
        let render_config = PdfRenderConfig::new()
            .set_target_width(target_width)
            .set_maximum_width(target_width)
            .set_maximum_height(MAX_RENDER_HEIGHT)
            .render_form_data(false)
            .render_annotations(true)
            .use_grayscale_rendering(false)
            .set_reverse_byte_order(false)
            .set_format(PdfBitmapFormat::BGRA);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|err| anyhow::anyhow!(err))?;

        let width = bitmap.width().max(0) as usize;
        let height = bitmap.height().max(0) as usize;
        let src_pixels = bitmap.as_raw_bytes();
        let src_stride = if height == 0 {
            0
        } else {
            src_pixels.len() / height
        };

        let pixels = bgra_rows_to_rgba(&src_pixels, width, height, src_stride);
        RgbaBitmap::new(width as u32, height as u32, pixels)
            .ok_or_else(|| anyhow::anyhow!("pdfium returned a short bitmap"))
    }
}

/// Repacks strided BGRA rows into tight RGBA, padding missing bytes with white.
fn bgra_rows_to_rgba(src: &[u8], width: usize, height: usize, stride: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width.saturating_mul(height).saturating_mul(4));
    for y in 0..height {
        let base = y.saturating_mul(stride);
        for x in 0..width {
            let idx = base.saturating_add(x.saturating_mul(4));
            let b = src.get(idx).copied().unwrap_or(255);
            let g = src.get(idx + 1).copied().unwrap_or(255);
            let r = src.get(idx + 2).copied().unwrap_or(255);
            let a = src.get(idx + 3).copied().unwrap_or(255);
            pixels.extend_from_slice(&[r, g, b, a]);
        }
    }
    pixels
}

fn pdfium_disabled() -> bool {
    std::env::var("STUDYSHELF_DISABLE_PDFIUM")
        .map(|v| !v.trim().is_empty() && v.trim() != "0")
        .unwrap_or(false)
}

fn bind_pdfium() -> anyhow::Result<Pdfium> {
    if let Ok(path) = std::env::var("STUDYSHELF_PDFIUM_LIB_PATH") {
        let path = PathBuf::from(path);
        let bindings = Pdfium::bind_to_library(&path).map_err(|err| {
            anyhow::anyhow!(
                "{err}\n\nFailed to load Pdfium from STUDYSHELF_PDFIUM_LIB_PATH={}.",
                path.display()
            )
        })?;
        return Ok(Pdfium::new(bindings));
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(dir) = std::env::var("STUDYSHELF_PDFIUM_DIR") {
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(Path::new(
            &dir,
        )));
    }
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(dir));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path(Path::new(
        ".pdfium",
    )));
    candidates.push(Pdfium::pdfium_platform_library_name_at_path(Path::new(".")));

    for path in candidates {
        if let Ok(bindings) = Pdfium::bind_to_library(&path) {
            log::debug!("pdfium loaded from {}", path.display());
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|err| {
        let lib_name = Pdfium::pdfium_platform_library_name();
        anyhow::anyhow!(
            "{err}\n\nPdfium library not found.\n- Install it system-wide, or\n- Place {} next to the executable, or\n- Set STUDYSHELF_PDFIUM_LIB_PATH.\n",
            lib_name.to_string_lossy()
        )
    })?;
    Ok(Pdfium::new(bindings))
}
