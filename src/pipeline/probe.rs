//! Image measurement and embed preparation.
//!
//! ## Why not decode everything?
//!
//! A PDF can carry JPEG data as-is (`DCTDecode`) and most PNG data as-is
//! (`FlateDecode` with the PNG predictor), so for those inputs we only read
//! the header: pixel size from the `image` crate, component count from the
//! JPEG frame header, colour type and IDAT payload from the PNG chunk list.
//! Only PNGs the PDF filter cannot express (alpha channel, `tRNS`
//! transparency, Adam7 interlacing) are decoded, once, into raw samples plus
//! a soft mask.

use crate::error::BuildError;
use crate::pipeline::input::ImageKind;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// An image read from disk, measured, and ready to embed.
#[derive(Debug, Clone)]
pub struct ProbedImage {
    pub path: PathBuf,
    pub kind: ImageKind,
    pub width: u32,
    pub height: u32,
    pub payload: Payload,
}

/// How the pixel data will be written into the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Whole JPEG file, embedded verbatim.
    Jpeg { data: Vec<u8>, components: u8 },
    /// Concatenated PNG IDAT data, embedded verbatim with the PNG predictor.
    PngFlate {
        data: Vec<u8>,
        color: PngColor,
        bits: u8,
    },
    /// Decoded 8-bit samples (`colors` per pixel) and an optional alpha plane.
    Raw {
        pixels: Vec<u8>,
        colors: u8,
        alpha: Option<Vec<u8>>,
    },
}

/// Colour model of a pass-through PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PngColor {
    Gray,
    Rgb,
    /// RGB triples, one per palette index.
    Indexed { palette: Vec<u8> },
}

impl PngColor {
    /// Samples per pixel in the IDAT stream.
    pub fn samples(&self) -> u8 {
        match self {
            PngColor::Gray | PngColor::Indexed { .. } => 1,
            PngColor::Rgb => 3,
        }
    }
}

/// Read only the pixel dimensions of `path`.
pub fn measure(path: &Path) -> Result<(u32, u32), BuildError> {
    let kind = kind_of(path)?;
    let data = read_file(path)?;
    dimensions(path, kind, &data)
}

/// Read, measure and prepare `path` for embedding.
///
/// # Errors
/// * [`BuildError::UnsupportedFormat`] for anything but .jpg/.jpeg/.png
/// * [`BuildError::Read`] if the file cannot be read
/// * [`BuildError::Measurement`] if the header is corrupt or truncated
pub fn probe(path: &Path) -> Result<ProbedImage, BuildError> {
    let kind = kind_of(path)?;
    let data = read_file(path)?;
    let (width, height) = dimensions(path, kind, &data)?;

    let payload = match kind {
        ImageKind::Jpeg => jpeg_payload(path, data)?,
        ImageKind::Png => png_payload(path, data)?,
    };

    debug!(
        "Probed {} ({width}x{height}, {})",
        path.display(),
        match &payload {
            Payload::Jpeg { .. } => "jpeg pass-through",
            Payload::PngFlate { .. } => "png pass-through",
            Payload::Raw { .. } => "decoded",
        }
    );

    Ok(ProbedImage {
        path: path.to_path_buf(),
        kind,
        width,
        height,
        payload,
    })
}

fn kind_of(path: &Path) -> Result<ImageKind, BuildError> {
    ImageKind::from_path(path).ok_or_else(|| BuildError::UnsupportedFormat {
        path: path.to_path_buf(),
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>, BuildError> {
    std::fs::read(path).map_err(|source| BuildError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn measurement(path: &Path, detail: impl Into<String>) -> BuildError {
    BuildError::Measurement {
        path: path.to_path_buf(),
        detail: detail.into(),
    }
}

fn dimensions(path: &Path, kind: ImageKind, data: &[u8]) -> Result<(u32, u32), BuildError> {
    image::ImageReader::with_format(Cursor::new(data), kind.image_format())
        .into_dimensions()
        .map_err(|e| measurement(path, e.to_string()))
}

// ── JPEG ─────────────────────────────────────────────────────────────────

fn jpeg_payload(path: &Path, data: Vec<u8>) -> Result<Payload, BuildError> {
    let components = jpeg_components(&data)
        .ok_or_else(|| measurement(path, "JPEG frame header not found"))?;
    match components {
        1 | 3 | 4 => Ok(Payload::Jpeg { data, components }),
        n => Err(measurement(path, format!("unsupported JPEG component count {n}"))),
    }
}

/// Component count from the first SOFn segment, or `None` if the marker
/// stream ends (or reaches scan data) before one is found.
pub(crate) fn jpeg_components(data: &[u8]) -> Option<u8> {
    if data.get(..2)? != [0xFF, 0xD8] {
        return None;
    }
    let mut i = 2;
    loop {
        if *data.get(i)? != 0xFF {
            return None;
        }
        // Fill bytes may precede a marker.
        while *data.get(i + 1)? == 0xFF {
            i += 1;
        }
        let marker = *data.get(i + 1)?;
        match marker {
            0x01 | 0xD0..=0xD7 => {
                i += 2;
                continue;
            }
            0xD9 | 0xDA => return None,
            _ => {}
        }
        let len = u16::from_be_bytes([*data.get(i + 2)?, *data.get(i + 3)?]) as usize;
        let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_sof {
            // FF Cn | Lh Ll | P | Yh Yl | Xh Xl | Nf
            return data.get(i + 9).copied();
        }
        i += 2 + len;
    }
}

// ── PNG ──────────────────────────────────────────────────────────────────

/// The parts of a PNG's chunk list the writer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PngInfo {
    pub bit_depth: u8,
    pub color_type: u8,
    pub interlaced: bool,
    pub palette: Option<Vec<u8>>,
    /// A `tRNS` chunk is present.
    pub transparency: bool,
    pub idat: Vec<u8>,
}

pub(crate) fn parse_png(data: &[u8]) -> Result<PngInfo, String> {
    if data.get(..8) != Some(PNG_SIGNATURE.as_slice()) {
        return Err("missing PNG signature".into());
    }
    let mut pos = 8;
    let mut header: Option<(u8, u8, bool)> = None;
    let mut palette = None;
    let mut transparency = false;
    let mut idat = Vec::new();

    loop {
        let len_bytes: [u8; 4] = data
            .get(pos..pos + 4)
            .and_then(|b| b.try_into().ok())
            .ok_or("truncated PNG chunk list")?;
        let len = u32::from_be_bytes(len_bytes) as usize;
        let kind = data.get(pos + 4..pos + 8).ok_or("truncated PNG chunk header")?;
        let body = data
            .get(pos + 8..pos + 8 + len)
            .ok_or("truncated PNG chunk body")?;

        match kind {
            b"IHDR" => {
                if body.len() < 13 {
                    return Err("short IHDR chunk".into());
                }
                header = Some((body[8], body[9], body[12] != 0));
            }
            b"PLTE" => palette = Some(body.to_vec()),
            b"tRNS" => transparency = true,
            b"IDAT" => idat.extend_from_slice(body),
            b"IEND" => break,
            _ => {}
        }
        // length + type + body + CRC
        pos += 12 + len;
    }

    let (bit_depth, color_type, interlaced) = header.ok_or("PNG has no IHDR chunk")?;
    if idat.is_empty() {
        return Err("PNG has no image data".into());
    }
    Ok(PngInfo {
        bit_depth,
        color_type,
        interlaced,
        palette,
        transparency,
        idat,
    })
}

fn png_payload(path: &Path, data: Vec<u8>) -> Result<Payload, BuildError> {
    let info = parse_png(&data).map_err(|detail| measurement(path, detail))?;

    if info.transparency {
        // The decoder expands tRNS into an alpha channel, which becomes the SMask.
        debug!("{}: tRNS present, decoding for a soft mask", path.display());
    } else if !info.interlaced {
        let color = match (info.color_type, info.palette) {
            (0, _) => Some(PngColor::Gray),
            (2, _) => Some(PngColor::Rgb),
            (3, Some(palette)) if !palette.is_empty() && palette.len() % 3 == 0 => {
                Some(PngColor::Indexed { palette })
            }
            (3, _) => return Err(measurement(path, "palette PNG without a valid PLTE chunk")),
            _ => None,
        };
        if let Some(color) = color {
            return Ok(Payload::PngFlate {
                data: info.idat,
                color,
                bits: info.bit_depth,
            });
        }
    }

    decode_png(path, &data)
}

fn decode_png(path: &Path, data: &[u8]) -> Result<Payload, BuildError> {
    let img = image::load_from_memory_with_format(data, image::ImageFormat::Png)
        .map_err(|e| measurement(path, e.to_string()))?;
    let color = img.color();

    let payload = match (color.has_color(), color.has_alpha()) {
        (false, false) => Payload::Raw {
            pixels: img.to_luma8().into_raw(),
            colors: 1,
            alpha: None,
        },
        (true, false) => Payload::Raw {
            pixels: img.to_rgb8().into_raw(),
            colors: 3,
            alpha: None,
        },
        (false, true) => {
            let (pixels, alpha) = split_alpha(&img.to_luma_alpha8().into_raw(), 1);
            Payload::Raw {
                pixels,
                colors: 1,
                alpha,
            }
        }
        (true, true) => {
            let (pixels, alpha) = split_alpha(&img.to_rgba8().into_raw(), 3);
            Payload::Raw {
                pixels,
                colors: 3,
                alpha,
            }
        }
    };
    Ok(payload)
}

/// Separate interleaved colour+alpha samples. A fully opaque alpha plane is dropped.
fn split_alpha(samples: &[u8], colors: usize) -> (Vec<u8>, Option<Vec<u8>>) {
    let stride = colors + 1;
    let mut pixels = Vec::with_capacity(samples.len() / stride * colors);
    let mut alpha = Vec::with_capacity(samples.len() / stride);
    for px in samples.chunks_exact(stride) {
        pixels.extend_from_slice(&px[..colors]);
        alpha.push(px[colors]);
    }
    let alpha = (!alpha.iter().all(|&a| a == u8::MAX)).then_some(alpha);
    (pixels, alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn encode(img: impl Into<image::DynamicImage>, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.into().write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn crc32(bytes: &[u8]) -> u32 {
        let mut crc = !0u32;
        for &b in bytes {
            crc ^= b as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            }
        }
        !crc
    }

    fn chunk(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = (body.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(body);
        let crc = crc32(&out[4..]);
        out.extend_from_slice(&crc.to_be_bytes());
        out
    }

    /// Insert a chunk right after IHDR (signature 8 + IHDR 25 bytes).
    fn with_chunk_after_ihdr(png: &[u8], kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = png[..33].to_vec();
        out.extend(chunk(kind, body));
        out.extend_from_slice(&png[33..]);
        out
    }

    #[test]
    fn rgb_jpeg_passes_through() {
        let dir = TempDir::new().unwrap();
        let bytes = encode(RgbImage::from_pixel(40, 30, Rgb([200, 10, 10])), ImageFormat::Jpeg);
        let path = write(&dir, "photo.JPG", &bytes);

        let probed = probe(&path).unwrap();
        assert_eq!((probed.width, probed.height), (40, 30));
        assert_eq!(probed.kind, ImageKind::Jpeg);
        assert_eq!(probed.payload, Payload::Jpeg { data: bytes, components: 3 });
    }

    #[test]
    fn gray_jpeg_has_one_component() {
        let bytes = encode(GrayImage::from_pixel(8, 8, Luma([90])), ImageFormat::Jpeg);
        assert_eq!(jpeg_components(&bytes), Some(1));
    }

    #[test]
    fn jpeg_walker_stops_at_scan_data() {
        // SOI, APP0 (len 4), SOS: no frame header before the scan.
        let data = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00, 0xFF, 0xDA, 0x00, 0x02];
        assert_eq!(jpeg_components(&data), None);
        assert_eq!(jpeg_components(b"GIF89a"), None);
        assert_eq!(jpeg_components(&[0xFF, 0xD8, 0xFF]), None);
    }

    #[test]
    fn rgb_png_passes_through_idat() {
        let dir = TempDir::new().unwrap();
        let bytes = encode(RgbImage::from_pixel(5, 7, Rgb([1, 2, 3])), ImageFormat::Png);
        let path = write(&dir, "flat.png", &bytes);

        let probed = probe(&path).unwrap();
        assert_eq!((probed.width, probed.height), (5, 7));
        match probed.payload {
            Payload::PngFlate { color, bits, data } => {
                assert_eq!(color, PngColor::Rgb);
                assert_eq!(bits, 8);
                assert!(!data.is_empty());
            }
            other => panic!("expected pass-through, got {other:?}"),
        }
    }

    #[test]
    fn alpha_png_is_split_into_colour_and_mask() {
        let dir = TempDir::new().unwrap();
        let bytes = encode(RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 128])), ImageFormat::Png);
        let path = write(&dir, "alpha.png", &bytes);

        match probe(&path).unwrap().payload {
            Payload::Raw { pixels, colors, alpha } => {
                assert_eq!(colors, 3);
                assert_eq!(pixels.len(), 3 * 2 * 3);
                assert_eq!(&pixels[..3], &[10, 20, 30]);
                assert_eq!(alpha, Some(vec![128; 6]));
            }
            other => panic!("expected decoded payload, got {other:?}"),
        }
    }

    #[test]
    fn opaque_alpha_plane_is_dropped() {
        let (pixels, alpha) = split_alpha(&[1, 255, 3, 255], 1);
        assert_eq!(pixels, vec![1, 3]);
        assert_eq!(alpha, None);

        let (pixels, alpha) = split_alpha(&[1, 2, 3, 255, 4, 5, 6, 255], 3);
        assert_eq!(pixels, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(alpha, None);
    }

    #[test]
    fn partial_alpha_plane_is_kept() {
        let (pixels, alpha) = split_alpha(&[1, 255, 3, 0, 5, 128], 1);
        assert_eq!(pixels, vec![1, 3, 5]);
        assert_eq!(alpha, Some(vec![255, 0, 128]));
    }

    #[test]
    fn trns_png_is_decoded_with_a_mask() {
        let dir = TempDir::new().unwrap();
        let plain = encode(
            GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 0 } else { 200 }])),
            ImageFormat::Png,
        );
        // Gray value 0 is transparent.
        let keyed = with_chunk_after_ihdr(&plain, b"tRNS", &[0, 0]);
        assert!(parse_png(&keyed).unwrap().transparency);
        assert!(!parse_png(&plain).unwrap().transparency);
        let path = write(&dir, "keyed.png", &keyed);

        match probe(&path).unwrap().payload {
            Payload::Raw { pixels, colors, alpha } => {
                assert_eq!(colors, 1);
                assert_eq!(pixels, vec![0, 200]);
                assert_eq!(alpha, Some(vec![0, 255]));
            }
            other => panic!("expected decoded payload, got {other:?}"),
        }
    }

    #[test]
    fn palette_chunks_are_collected() {
        let mut data = PNG_SIGNATURE.to_vec();
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&2u32.to_be_bytes());
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, 3, 0, 0, 0]);
        data.extend(chunk(b"IHDR", &ihdr));
        data.extend(chunk(b"PLTE", &[255, 0, 0, 0, 0, 255]));
        data.extend(chunk(b"IDAT", &[1, 2]));
        data.extend(chunk(b"IDAT", &[3]));
        data.extend(chunk(b"IEND", &[]));

        let info = parse_png(&data).unwrap();
        assert_eq!(info.color_type, 3);
        assert_eq!(info.bit_depth, 8);
        assert!(!info.interlaced);
        assert_eq!(info.palette, Some(vec![255, 0, 0, 0, 0, 255]));
        assert!(!info.transparency);
        assert_eq!(info.idat, vec![1, 2, 3]);
    }

    #[test]
    fn truncated_png_is_rejected() {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(&[0, 0, 0, 13, b'I', b'H']);
        assert!(parse_png(&data).is_err());
        assert!(parse_png(b"not a png at all").is_err());
    }

    #[test]
    fn corrupt_file_is_a_measurement_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "broken.png", b"definitely not an image");
        let err = probe(&path).unwrap_err();
        assert!(matches!(err, BuildError::Measurement { .. }), "{err:?}");
        assert!(err.to_string().starts_with("failed to add broken.png: "));
    }

    #[test]
    fn unsupported_and_missing_files() {
        let dir = TempDir::new().unwrap();
        let gif = write(&dir, "anim.gif", b"GIF89a");
        assert!(matches!(probe(&gif), Err(BuildError::UnsupportedFormat { .. })));
        assert!(matches!(
            probe(&dir.path().join("gone.jpg")),
            Err(BuildError::Read { .. })
        ));
    }

    #[test]
    fn measure_reads_only_dimensions() {
        let dir = TempDir::new().unwrap();
        let bytes = encode(GrayImage::from_pixel(11, 13, Luma([0])), ImageFormat::Png);
        let path = write(&dir, "g.png", &bytes);
        assert_eq!(measure(&path).unwrap(), (11, 13));
    }
}
