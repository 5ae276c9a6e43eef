//! Document stream: one PDF page per image, written with `lopdf`.
//!
//! ## Why build the object graph by hand?
//!
//! Every page is a single image XObject painted by a four-operator content
//! stream (`q cm Do Q`), so the document is small enough to assemble
//! directly. That keeps JPEG and plain PNG bytes untouched on their way into
//! the file; only the content streams and decoded-PNG samples are deflated.
//!
//! ## Coordinates
//!
//! [`PageLayout`] works in millimetres from the top-left corner. PDF user
//! space is points from the bottom-left, so each rectangle is scaled by
//! 72/25.4 and its y origin flipped against the page height.

use crate::config::{ConversionConfig, PageSizeMode};
use crate::error::BuildError;
use crate::output::{StreamKind, StreamSummary};
use crate::pipeline::layout::{compute_layout, PageLayout};
use crate::pipeline::probe::{self, Payload, PngColor, ProbedImage};
use crate::pipeline::sink::{write_error, PendingFile};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

const PT_PER_MM: f64 = 72.0 / 25.4;
const IMAGE_NAME: &str = "Im0";

/// Accumulates pages in memory and writes the document on [`finish`](Self::finish).
pub struct DocumentBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    mode: PageSizeMode,
    compress: bool,
    title: Option<String>,
    output: PendingFile,
}

impl DocumentBuilder {
    /// Start a document destined for `output`.
    ///
    /// The target path is not touched until [`finish`](Self::finish) succeeds;
    /// a staging file is created beside it right away so an unwritable
    /// destination fails before any image is read.
    pub fn create(output: &Path, mode: PageSizeMode, config: &ConversionConfig) -> Result<Self, BuildError> {
        let output = PendingFile::create(output)?;
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Ok(Self {
            doc,
            pages_id,
            kids: Vec::new(),
            mode,
            compress: config.compress_document,
            title: config.title.clone(),
            output,
        })
    }

    /// Append one page for `path`.
    ///
    /// The image is probed and laid out before anything is added to the
    /// document, so a failing image leaves no partial page behind.
    pub fn add_image(&mut self, path: &Path) -> Result<PageLayout, BuildError> {
        let image = probe::probe(path)?;
        let layout = compute_layout(image.width, image.height, &self.mode).map_err(|e| {
            BuildError::Measurement {
                path: path.to_path_buf(),
                detail: e.to_string(),
            }
        })?;
        let content = page_content(&layout)
            .encode()
            .map_err(|e| write_error(self.output.target(), e))?;

        let xobject_id = self.add_xobject(image);
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                pt(layout.page_width),
                pt(layout.page_height),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_NAME => xobject_id },
            },
        });
        self.kids.push(page_id.into());

        debug!(
            "Page {}: {} on {:.1}x{:.1} mm at ({:.1}, {:.1}) size {:.1}x{:.1} mm",
            self.kids.len(),
            path.display(),
            layout.page_width,
            layout.page_height,
            layout.draw_x,
            layout.draw_y,
            layout.draw_width,
            layout.draw_height
        );
        Ok(layout)
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Write the page tree, catalog and info dictionary, then move the file
    /// into place. Returns the size of the written file.
    pub fn finish(self) -> Result<u64, BuildError> {
        let DocumentBuilder {
            mut doc,
            pages_id,
            kids,
            compress,
            title,
            mut output,
            ..
        } = self;

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut info = dictionary! {
            "Producer" => text_string(concat!("edgequake-img2pdf ", env!("CARGO_PKG_VERSION"))),
            "CreationDate" => Object::string_literal(
                chrono::Local::now().format("D:%Y%m%d%H%M%S").to_string(),
            ),
        };
        if let Some(title) = title.as_deref() {
            info.set("Title", text_string(title));
        }
        let info_id = doc.add_object(info);
        doc.trailer.set("Info", info_id);

        if compress {
            doc.compress();
        }

        let target = output.target().to_path_buf();
        {
            let mut writer = BufWriter::new(&mut output);
            doc.save_to(&mut writer).map_err(|e| write_error(&target, e))?;
            writer.flush().map_err(|e| write_error(&target, e))?;
        }
        output.commit()
    }

    fn add_xobject(&mut self, image: ProbedImage) -> ObjectId {
        let ProbedImage {
            width,
            height,
            payload,
            ..
        } = image;
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
        };

        match payload {
            Payload::Jpeg { data, components } => {
                dict.set("ColorSpace", device_space(components));
                dict.set("BitsPerComponent", 8);
                dict.set("Filter", "DCTDecode");
                if components == 4 {
                    // Adobe CMYK JPEGs store inverted samples.
                    dict.set("Decode", [1, 0, 1, 0, 1, 0, 1, 0].map(Object::Integer).to_vec());
                }
                self.doc.add_object(Stream::new(dict, data).with_compression(false))
            }
            Payload::PngFlate { data, color, bits } => {
                let colors = color.samples();
                let space: Object = match color {
                    PngColor::Gray => "DeviceGray".into(),
                    PngColor::Rgb => "DeviceRGB".into(),
                    PngColor::Indexed { palette } => {
                        let hival = (palette.len() / 3) as i64 - 1;
                        Object::Array(vec![
                            "Indexed".into(),
                            "DeviceRGB".into(),
                            Object::Integer(hival),
                            Object::String(palette, StringFormat::Hexadecimal),
                        ])
                    }
                };
                dict.set("ColorSpace", space);
                dict.set("BitsPerComponent", bits as i64);
                dict.set("Filter", "FlateDecode");
                dict.set(
                    "DecodeParms",
                    dictionary! {
                        "Predictor" => 15,
                        "Colors" => colors as i64,
                        "BitsPerComponent" => bits as i64,
                        "Columns" => width as i64,
                    },
                );
                self.doc.add_object(Stream::new(dict, data).with_compression(false))
            }
            Payload::Raw {
                pixels,
                colors,
                alpha,
            } => {
                dict.set("ColorSpace", device_space(colors));
                dict.set("BitsPerComponent", 8);
                if let Some(alpha) = alpha {
                    let smask = dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => width as i64,
                        "Height" => height as i64,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                    };
                    let smask_id = self.doc.add_object(Stream::new(smask, alpha));
                    dict.set("SMask", smask_id);
                }
                self.doc.add_object(Stream::new(dict, pixels))
            }
        }
    }
}

/// Build one document from `images`, in order.
///
/// `on_item_done` is called with the number of pages committed so far,
/// after each page.
///
/// # Errors
/// [`BuildError::EmptyInput`] before anything is created when `images` is
/// empty; otherwise the first per-image or write failure.
pub fn build_document(
    images: &[PathBuf],
    output: &Path,
    mode: PageSizeMode,
    config: &ConversionConfig,
    mut on_item_done: impl FnMut(usize),
) -> Result<StreamSummary, BuildError> {
    if images.is_empty() {
        return Err(BuildError::EmptyInput);
    }
    let start = Instant::now();
    info!("Writing document {} ({} pages)", output.display(), images.len());

    let mut builder = DocumentBuilder::create(output, mode, config)?;
    for path in images {
        builder.add_image(path)?;
        on_item_done(builder.page_count());
    }
    let items = builder.page_count();
    let bytes_written = builder.finish()?;

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Document written: {} ({items} pages, {bytes_written} bytes, {duration_ms}ms)",
        output.display()
    );
    Ok(StreamSummary {
        kind: StreamKind::Document,
        path: output.to_path_buf(),
        items,
        bytes_written,
        duration_ms,
    })
}

fn page_content(layout: &PageLayout) -> Content {
    let x = layout.draw_x * PT_PER_MM;
    let w = layout.draw_width * PT_PER_MM;
    let h = layout.draw_height * PT_PER_MM;
    let y = (layout.page_height - layout.draw_y - layout.draw_height) * PT_PER_MM;
    Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::from(w),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::from(h),
                    Object::from(x),
                    Object::from(y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ],
    }
}

fn pt(mm: f64) -> Object {
    Object::from(mm * PT_PER_MM)
}

fn device_space(components: u8) -> Object {
    match components {
        1 => "DeviceGray".into(),
        4 => "DeviceCMYK".into(),
        _ => "DeviceRGB".into(),
    }
}

/// PDF text string: literal for ASCII, UTF-16BE with BOM otherwise.
fn text_string(s: &str) -> Object {
    if s.is_ascii() {
        return Object::string_literal(s);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in s.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

impl std::fmt::Debug for DocumentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBuilder")
            .field("target", &self.output.target())
            .field("pages", &self.kids.len())
            .field("mode", &self.mode)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Sheet;
    use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use lopdf::Dictionary;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn save(dir: &TempDir, name: &str, img: impl Into<image::DynamicImage>, format: ImageFormat) -> PathBuf {
        let mut buf = Cursor::new(Vec::new());
        img.into().write_to(&mut buf, format).unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, buf.into_inner()).unwrap();
        path
    }

    fn num(obj: &Object) -> f64 {
        match obj {
            Object::Integer(i) => *i as f64,
            Object::Real(r) => *r as f64,
            other => panic!("not a number: {other:?}"),
        }
    }

    fn media_boxes(path: &Path) -> Vec<(f64, f64)> {
        let doc = Document::load(path).unwrap();
        doc.get_pages()
            .values()
            .map(|id| {
                let page = doc.get_object(*id).unwrap().as_dict().unwrap();
                let mb = page.get(b"MediaBox").unwrap().as_array().unwrap();
                (num(&mb[2]), num(&mb[3]))
            })
            .collect()
    }

    fn page_image(doc: &Document, page: ObjectId) -> Dictionary {
        let page = doc.get_object(page).unwrap().as_dict().unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let id = xobjects.get(IMAGE_NAME.as_bytes()).unwrap().as_reference().unwrap();
        doc.get_object(id).unwrap().as_stream().unwrap().dict.clone()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn fit_to_image_pages_follow_input_order() {
        let dir = TempDir::new().unwrap();
        let images = vec![
            save(&dir, "1.png", RgbImage::from_pixel(96, 192, Rgb([9, 9, 9])), ImageFormat::Png),
            save(&dir, "2.jpg", RgbImage::from_pixel(192, 96, Rgb([9, 9, 9])), ImageFormat::Jpeg),
            save(&dir, "3.png", GrayImage::from_pixel(48, 48, Luma([0])), ImageFormat::Png),
        ];
        let out = dir.path().join("out.pdf");
        let mut ticks = Vec::new();
        let summary = build_document(
            &images,
            &out,
            PageSizeMode::FitToImage { dpi: 96.0 },
            &ConversionConfig::default(),
            |n| ticks.push(n),
        )
        .unwrap();

        assert_eq!(ticks, [1, 2, 3]);
        assert_eq!(summary.items, 3);
        assert_eq!(summary.kind, StreamKind::Document);
        assert_eq!(summary.bytes_written, std::fs::metadata(&out).unwrap().len());

        let boxes = media_boxes(&out);
        assert_eq!(boxes.len(), 3);
        assert!(close(boxes[0].0, 72.0) && close(boxes[0].1, 144.0), "{boxes:?}");
        assert!(close(boxes[1].0, 144.0) && close(boxes[1].1, 72.0), "{boxes:?}");
        assert!(close(boxes[2].0, 36.0) && close(boxes[2].1, 36.0), "{boxes:?}");
    }

    #[test]
    fn fixed_sheet_pages_are_a4() {
        let dir = TempDir::new().unwrap();
        let images = vec![save(&dir, "wide.png", RgbImage::new(400, 100), ImageFormat::Png)];
        let out = dir.path().join("a4.pdf");
        build_document(&images, &out, PageSizeMode::FixedSheet(Sheet::A4), &ConversionConfig::default(), |_| {})
            .unwrap();
        let boxes = media_boxes(&out);
        assert!(close(boxes[0].0, 595.28) && close(boxes[0].1, 841.89), "{boxes:?}");
    }

    #[test]
    fn payloads_map_to_pdf_filters() {
        let dir = TempDir::new().unwrap();
        let images = vec![
            save(&dir, "a.jpg", GrayImage::from_pixel(8, 8, Luma([100])), ImageFormat::Jpeg),
            save(&dir, "b.png", RgbImage::from_pixel(8, 8, Rgb([1, 2, 3])), ImageFormat::Png),
            save(&dir, "c.png", RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 4])), ImageFormat::Png),
        ];
        let out = dir.path().join("mixed.pdf");
        let config = ConversionConfig::builder().compress_document(false).build().unwrap();
        build_document(&images, &out, PageSizeMode::default(), &config, |_| {}).unwrap();

        let doc = Document::load(&out).unwrap();
        let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();

        let jpeg = page_image(&doc, pages[0]);
        assert_eq!(jpeg.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");
        assert_eq!(jpeg.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceGray");

        let png = page_image(&doc, pages[1]);
        assert_eq!(png.get(b"Filter").unwrap().as_name().unwrap(), b"FlateDecode");
        let parms = png.get(b"DecodeParms").unwrap().as_dict().unwrap();
        assert_eq!(num(parms.get(b"Predictor").unwrap()), 15.0);
        assert_eq!(num(parms.get(b"Colors").unwrap()), 3.0);

        let alpha = page_image(&doc, pages[2]);
        assert!(alpha.get(b"SMask").unwrap().as_reference().is_ok());
        assert!(alpha.get(b"Filter").is_err(), "uncompressed document keeps raw samples");
    }

    #[test]
    fn title_lands_in_info_dictionary() {
        let dir = TempDir::new().unwrap();
        let images = vec![save(&dir, "x.png", RgbImage::new(4, 4), ImageFormat::Png)];
        let out = dir.path().join("t.pdf");
        let config = ConversionConfig::builder().title("Scans 2024").build().unwrap();
        build_document(&images, &out, PageSizeMode::default(), &config, |_| {}).unwrap();

        let doc = Document::load(&out).unwrap();
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_object(info_id).unwrap().as_dict().unwrap();
        match info.get(b"Title").unwrap() {
            Object::String(bytes, _) => assert_eq!(bytes, b"Scans 2024"),
            other => panic!("unexpected title object {other:?}"),
        }
    }

    #[test]
    fn first_bad_image_stops_the_build_and_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let good = save(&dir, "good.png", RgbImage::new(4, 4), ImageFormat::Png);
        let bad = dir.path().join("bad.jpg");
        std::fs::write(&bad, b"garbage").unwrap();
        let never = save(&dir, "never.png", RgbImage::new(4, 4), ImageFormat::Png);

        let out = dir.path().join("out.pdf");
        let mut ticks = Vec::new();
        let err = build_document(
            &[good, bad.clone(), never],
            &out,
            PageSizeMode::default(),
            &ConversionConfig::default(),
            |n| ticks.push(n),
        )
        .unwrap_err();

        assert!(matches!(err, BuildError::Measurement { ref path, .. } if path == &bad), "{err:?}");
        assert_eq!(ticks, [1]);
        assert!(!out.exists());
    }

    #[test]
    fn empty_input_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("empty.pdf");
        let err = build_document(&[], &out, PageSizeMode::default(), &ConversionConfig::default(), |_| {})
            .unwrap_err();
        assert!(matches!(err, BuildError::EmptyInput));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn non_ascii_titles_are_utf16() {
        match text_string("Élan") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(&bytes[..2], &[0xFE, 0xFF]);
                assert_eq!(bytes.len(), 2 + 4 * 2);
            }
            other => panic!("{other:?}"),
        }
    }
}
