//! Page geometry: where an image of a given pixel size goes on its page.
//!
//! All functions here are pure and testable without any I/O or images.
//! Results are in millimetres with a top-left origin; the document writer
//! flips the y axis when it emits PDF coordinates.

use crate::config::{PageSizeMode, Sheet};
use crate::error::LayoutError;
use serde::{Deserialize, Serialize};

const MM_PER_INCH: f64 = 25.4;

/// Page size and image rectangle for one page, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_width: f64,
    pub page_height: f64,
    pub draw_x: f64,
    pub draw_y: f64,
    pub draw_width: f64,
    pub draw_height: f64,
}

/// Compute the layout of a `width × height` px image under `mode`.
///
/// # Errors
/// [`LayoutError::ZeroDimension`] when either dimension is zero; invalid
/// sheets and DPI values are reported as well, though a validated
/// [`crate::ConversionJob`] never carries them.
pub fn compute_layout(width: u32, height: u32, mode: &PageSizeMode) -> Result<PageLayout, LayoutError> {
    if width == 0 || height == 0 {
        return Err(LayoutError::ZeroDimension { width, height });
    }
    mode.validate()?;

    let layout = match mode {
        PageSizeMode::FixedSheet(sheet) => fixed_sheet_layout(width as f64, height as f64, sheet),
        PageSizeMode::FitToImage { dpi } => {
            let page_width = pixel_to_mm(width as f64, *dpi);
            let page_height = pixel_to_mm(height as f64, *dpi);
            PageLayout {
                page_width,
                page_height,
                draw_x: 0.0,
                draw_y: 0.0,
                draw_width: page_width,
                draw_height: page_height,
            }
        }
    };
    Ok(layout)
}

/// Convert a pixel length to millimetres at `dpi`.
pub fn pixel_to_mm(px: f64, dpi: f64) -> f64 {
    px / dpi * MM_PER_INCH
}

/// Largest uniform scale that fits `src` inside `max`.
pub fn fit_scale(src_w: f64, src_h: f64, max_w: f64, max_h: f64) -> f64 {
    (max_w / src_w).min(max_h / src_h)
}

fn fixed_sheet_layout(src_w: f64, src_h: f64, sheet: &Sheet) -> PageLayout {
    let avail_w = sheet.available_width();
    let avail_h = sheet.available_height();
    let scale = fit_scale(src_w, src_h, avail_w, avail_h);

    // Snap the binding edge to the bound so the fit is exactly tight.
    let (draw_width, draw_height) = if avail_w / src_w <= avail_h / src_h {
        (avail_w, (src_h * scale).min(avail_h))
    } else {
        ((src_w * scale).min(avail_w), avail_h)
    };

    PageLayout {
        page_width: sheet.width_mm,
        page_height: sheet.height_mm,
        draw_x: (sheet.width_mm - draw_width) / 2.0,
        draw_y: (sheet.height_mm - draw_height) / 2.0,
        draw_width,
        draw_height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn a4() -> PageSizeMode {
        PageSizeMode::FixedSheet(Sheet::A4)
    }

    fn assert_tight_fit(w: u32, h: u32) {
        let l = compute_layout(w, h, &a4()).unwrap();
        let (aw, ah) = (Sheet::A4.available_width(), Sheet::A4.available_height());
        let src_ratio = w as f64 / h as f64;
        let drawn_ratio = l.draw_width / l.draw_height;
        assert!(
            (src_ratio - drawn_ratio).abs() / src_ratio < 1e-9,
            "{w}x{h}: ratio {src_ratio} vs {drawn_ratio}"
        );
        assert!(l.draw_width <= aw && l.draw_height <= ah, "{w}x{h}: {l:?}");
        assert!(l.draw_width == aw || l.draw_height == ah, "{w}x{h}: not tight {l:?}");
        // Centred on the full sheet.
        assert!((l.draw_x * 2.0 + l.draw_width - Sheet::A4.width_mm).abs() < EPS);
        assert!((l.draw_y * 2.0 + l.draw_height - Sheet::A4.height_mm).abs() < EPS);
    }

    #[test]
    fn fixed_sheet_portrait_binds_on_width_or_height() {
        assert_tight_fit(1000, 1500);
        assert_tight_fit(190, 277);
    }

    #[test]
    fn fixed_sheet_landscape() {
        assert_tight_fit(4000, 3000);
        let l = compute_layout(4000, 3000, &a4()).unwrap();
        assert_eq!(l.draw_width, 190.0);
        assert!((l.draw_height - 142.5).abs() < EPS);
        assert!((l.draw_y - (297.0 - 142.5) / 2.0).abs() < EPS);
    }

    #[test]
    fn fixed_sheet_upscales_small_images() {
        let l = compute_layout(10, 10, &a4()).unwrap();
        assert_eq!(l.draw_width, 190.0);
        assert_eq!(l.draw_height, 190.0);
        assert_eq!(l.page_width, 210.0);
        assert_eq!(l.page_height, 297.0);
    }

    #[test]
    fn fixed_sheet_extreme_aspects() {
        for (w, h) in [(1, 1), (1, 10_000), (10_000, 1), (3, 7), (7919, 104_729)] {
            assert_tight_fit(w, h);
        }
    }

    #[test]
    fn fit_to_image_matches_pixel_size() {
        let mode = PageSizeMode::FitToImage { dpi: 96.0 };
        let l = compute_layout(960, 480, &mode).unwrap();
        assert_eq!(l.page_width, pixel_to_mm(960.0, 96.0));
        assert_eq!(l.page_height, pixel_to_mm(480.0, 96.0));
        assert!((l.page_width - 254.0).abs() < EPS);
        assert_eq!((l.draw_x, l.draw_y), (0.0, 0.0));
        assert_eq!((l.draw_width, l.draw_height), (l.page_width, l.page_height));
    }

    #[test]
    fn fit_to_image_honours_dpi() {
        let l = compute_layout(300, 600, &PageSizeMode::FitToImage { dpi: 300.0 }).unwrap();
        assert!((l.page_width - 25.4).abs() < EPS);
        assert!((l.page_height - 50.8).abs() < EPS);
    }

    #[test]
    fn zero_dimension_is_an_error() {
        assert_eq!(
            compute_layout(0, 10, &a4()),
            Err(LayoutError::ZeroDimension { width: 0, height: 10 })
        );
        assert!(compute_layout(10, 0, &PageSizeMode::default()).is_err());
    }

    #[test]
    fn fit_scale_picks_the_smaller_factor() {
        assert_eq!(fit_scale(100.0, 50.0, 50.0, 50.0), 0.5);
        assert_eq!(fit_scale(50.0, 100.0, 50.0, 50.0), 0.5);
    }
}
