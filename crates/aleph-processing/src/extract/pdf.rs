//! PDF text extraction: native text layer plus OCR of embedded images.
//!
//! Embedded images are decoded in-process when their filter and color space
//! are understood. A page holding any other image is handed to the
//! [`PageImageExporter`] as a whole so its images are neither skipped nor
//! read twice.

use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::ExtractionError;
use crate::ocr::OcrEngine;
use crate::pdf_images::PageImageExporter;

const FORMAT: &str = "PDF";

/// An embedded image in a form tesseract can read once written to disk.
enum EmbeddedImage {
    /// DCT-encoded streams are complete JPEG files.
    Jpeg(Vec<u8>),
    /// JPEG 2000 codestreams.
    Jpx(Vec<u8>),
    /// Decoded 8-bit pixels.
    Pixels {
        width: u32,
        height: u32,
        pixels: Pixels,
    },
}

#[derive(Debug, PartialEq)]
enum Pixels {
    Gray(Vec<u8>),
    Rgb(Vec<u8>),
}

/// Color spaces an image can be decoded from without poppler.
#[derive(Debug, Clone, PartialEq)]
enum ImageColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed {
        base: Box<ImageColorSpace>,
        hival: u8,
        palette: Vec<u8>,
    },
}

impl ImageColorSpace {
    fn components(&self) -> usize {
        match self {
            ImageColorSpace::Gray | ImageColorSpace::Indexed { .. } => 1,
            ImageColorSpace::Rgb => 3,
            ImageColorSpace::Cmyk => 4,
        }
    }
}

/// Page N's text, then OCR text of page N's images, for every page in order,
/// joined with newlines.
///
/// Images that cannot be read by either route are reported in `warnings`.
pub(super) fn extract_pdf(
    path: &Path,
    ocr: &dyn OcrEngine,
    exporter: &dyn PageImageExporter,
    warnings: &mut Vec<String>,
) -> Result<String, ExtractionError> {
    let doc = Document::load(path).map_err(|e| ExtractionError::parse(FORMAT, e))?;
    let scratch = tempfile::tempdir()?;
    let mut parts: Vec<String> = Vec::new();

    // get_pages is ordered by page number.
    for (page_number, page_id) in doc.get_pages() {
        match doc.extract_text(&[page_number]) {
            Ok(text) => parts.push(text),
            Err(e) => {
                tracing::debug!(page = page_number, error = %e, "No text layer on PDF page");
                parts.push(String::new());
            }
        }

        let images = page_images(&doc, page_id);
        let image_paths = if images.iter().all(Result::is_ok) {
            write_page_images(images, scratch.path(), page_number, warnings)?
        } else {
            match exporter.export_page(path, page_number, scratch.path()) {
                Ok(files) if !files.is_empty() => files,
                outcome => {
                    let reason = match outcome {
                        Err(e) => e.to_string(),
                        Ok(_) => "no images exported".to_string(),
                    };
                    tracing::warn!(
                        page = page_number,
                        error = %reason,
                        "Embedded image export failed, decoding what is readable"
                    );
                    write_page_images(images, scratch.path(), page_number, warnings)?
                }
            }
        };

        for image_path in image_paths {
            parts.push(ocr.ocr_image(&image_path)?);
        }
    }

    Ok(parts.join("\n"))
}

/// Number of pages, used by the rasterizer.
pub(crate) fn page_count(path: &Path) -> Result<u32, ExtractionError> {
    let doc = Document::load(path).map_err(|e| ExtractionError::parse(FORMAT, e))?;
    Ok(doc.get_pages().len() as u32)
}

/// Write decoded images to disk; undecodable ones become warnings.
fn write_page_images(
    images: Vec<Result<EmbeddedImage, String>>,
    dir: &Path,
    page_number: u32,
    warnings: &mut Vec<String>,
) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut paths = Vec::with_capacity(images.len());
    for (index, image) in images.into_iter().enumerate() {
        let written = match image {
            Ok(image) => write_for_ocr(image, dir, page_number, index)?,
            Err(reason) => Err(reason),
        };
        match written {
            Ok(path) => paths.push(path),
            Err(reason) => {
                tracing::warn!(
                    page = page_number,
                    image = index,
                    reason = %reason,
                    "Embedded PDF image not read"
                );
                warnings.push(format!(
                    "Embedded image {} on page {} could not be read: {}",
                    index + 1,
                    page_number,
                    reason
                ));
            }
        }
    }
    Ok(paths)
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match obj {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        _ => None,
    }
}

/// Resources of a page, inherited from ancestor page-tree nodes when absent.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    // Bounded walk; page trees are shallow and this guards against cycles.
    for _ in 0..32 {
        if let Ok(resources) = node.get(b"Resources") {
            return resolve_dict(doc, resources);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Every image XObject of the page, decoded or with the reason it was not.
fn page_images(doc: &Document, page_id: ObjectId) -> Vec<Result<EmbeddedImage, String>> {
    let Some(xobjects) = page_resources(doc, page_id)
        .and_then(|res| res.get(b"XObject").ok())
        .and_then(|obj| resolve_dict(doc, obj))
    else {
        return Vec::new();
    };

    xobjects
        .iter()
        .filter_map(|(_, value)| match resolve(doc, value) {
            Object::Stream(stream) if is_image(stream) => Some(decode_image(doc, stream)),
            _ => None,
        })
        .collect()
}

fn is_image(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"Subtype").and_then(Object::as_name), Ok(name) if name == b"Image")
}

fn filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_image(doc: &Document, stream: &Stream) -> Result<EmbeddedImage, String> {
    let filters = filters(stream);
    match filters.last().map(Vec::as_slice) {
        Some(b"DCTDecode") if filters.len() == 1 => {
            return Ok(EmbeddedImage::Jpeg(stream.content.clone()))
        }
        Some(b"JPXDecode") if filters.len() == 1 => {
            return Ok(EmbeddedImage::Jpx(stream.content.clone()))
        }
        Some(b"FlateDecode") | Some(b"LZWDecode") | Some(b"ASCII85Decode") | None => {}
        Some(other) => {
            return Err(format!(
                "unsupported filter {}",
                String::from_utf8_lossy(other)
            ))
        }
    }

    let width = positive_dimension(stream, b"Width")?;
    let height = positive_dimension(stream, b"Height")?;
    let is_mask = stream
        .dict
        .get(b"ImageMask")
        .and_then(Object::as_bool)
        .unwrap_or(false);

    let (color_space, bits) = if is_mask {
        (ImageColorSpace::Gray, 1)
    } else {
        let color_space = match stream.dict.get(b"ColorSpace") {
            Ok(obj) => parse_color_space(doc, obj, 0)?,
            Err(_) => return Err("missing ColorSpace".to_string()),
        };
        let bits = stream
            .dict
            .get(b"BitsPerComponent")
            .and_then(Object::as_i64)
            .unwrap_or(8);
        (color_space, bits)
    };
    let bits = match bits {
        1 | 2 | 4 | 8 | 16 => bits as u8,
        other => return Err(format!("unsupported BitsPerComponent {}", other)),
    };

    let data = if filters.is_empty() {
        stream.content.clone()
    } else {
        image_stream_content(stream)?
    };

    let samples = unpack_samples(
        &data,
        width as usize,
        height as usize,
        color_space.components(),
        bits,
    )?;
    let pixels = to_pixels(&color_space, samples, bits, decode_inverted(stream))?;

    Ok(EmbeddedImage::Pixels {
        width,
        height,
        pixels,
    })
}

fn positive_dimension(stream: &Stream, key: &[u8]) -> Result<u32, String> {
    match stream.dict.get(key).and_then(Object::as_i64) {
        Ok(value) if value > 0 && value <= u32::MAX as i64 => Ok(value as u32),
        _ => Err(format!("invalid {}", String::from_utf8_lossy(key))),
    }
}

/// Remove Flate/LZW/ASCII85 encoding from an image stream.
fn image_stream_content(stream: &Stream) -> Result<Vec<u8>, String> {
    // lopdf refuses to decompress streams whose Subtype is Image.
    let mut plain = stream.clone();
    plain.dict.remove(b"Subtype");
    plain
        .decompressed_content()
        .map_err(|e| format!("stream decode failed: {}", e))
}

/// `/Decode [1 0]` on a single-component image swaps black and white.
fn decode_inverted(stream: &Stream) -> bool {
    let Ok(decode) = stream.dict.get(b"Decode").and_then(Object::as_array) else {
        return false;
    };
    let bounds: Vec<f32> = decode.iter().filter_map(|o| o.as_float().ok()).collect();
    matches!(bounds.as_slice(), [lo, hi] if lo > hi)
}

fn parse_color_space(doc: &Document, obj: &Object, depth: u8) -> Result<ImageColorSpace, String> {
    match resolve(doc, obj) {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(ImageColorSpace::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ImageColorSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(ImageColorSpace::Cmyk),
            other => Err(format!(
                "unsupported color space {}",
                String::from_utf8_lossy(other)
            )),
        },
        Object::Array(items) => {
            let family = items
                .first()
                .and_then(|o| o.as_name().ok())
                .ok_or_else(|| "malformed color space".to_string())?;
            match family {
                b"CalGray" => Ok(ImageColorSpace::Gray),
                b"CalRGB" => Ok(ImageColorSpace::Rgb),
                b"ICCBased" => {
                    let components = items
                        .get(1)
                        .map(|o| resolve(doc, o))
                        .and_then(|o| o.as_stream().ok())
                        .and_then(|s| s.dict.get(b"N").and_then(Object::as_i64).ok());
                    match components {
                        Some(1) => Ok(ImageColorSpace::Gray),
                        Some(3) => Ok(ImageColorSpace::Rgb),
                        Some(4) => Ok(ImageColorSpace::Cmyk),
                        other => Err(format!("unsupported ICC component count {:?}", other)),
                    }
                }
                b"Indexed" | b"I" if depth == 0 => {
                    let [_, base, hival, lookup] = items.as_slice() else {
                        return Err("malformed Indexed color space".to_string());
                    };
                    let base = parse_color_space(doc, base, depth + 1)?;
                    let hival = resolve(doc, hival)
                        .as_i64()
                        .map_err(|_| "malformed Indexed hival".to_string())?
                        .clamp(0, 255) as u8;
                    let palette = match resolve(doc, lookup) {
                        Object::String(bytes, _) => bytes.clone(),
                        Object::Stream(stream) => stream
                            .get_plain_content()
                            .map_err(|e| format!("palette decode failed: {}", e))?,
                        _ => return Err("malformed Indexed lookup".to_string()),
                    };
                    Ok(ImageColorSpace::Indexed {
                        base: Box::new(base),
                        hival,
                        palette,
                    })
                }
                other => Err(format!(
                    "unsupported color space {}",
                    String::from_utf8_lossy(other)
                )),
            }
        }
        _ => Err("malformed color space".to_string()),
    }
}

/// One byte per sample. Rows are padded to whole bytes; 16-bit samples keep
/// their high byte. Values are not rescaled.
fn unpack_samples(
    data: &[u8],
    width: usize,
    height: usize,
    components: usize,
    bits: u8,
) -> Result<Vec<u8>, String> {
    let per_row = width * components;
    let row_bytes = (per_row * bits as usize).div_ceil(8);
    if data.len() < row_bytes * height {
        return Err(format!(
            "image data too short: {} of {} bytes",
            data.len(),
            row_bytes * height
        ));
    }

    let mut samples = Vec::with_capacity(per_row * height);
    for row in data.chunks_exact(row_bytes).take(height) {
        match bits {
            8 => samples.extend_from_slice(&row[..per_row]),
            16 => samples.extend(row.chunks_exact(2).take(per_row).map(|pair| pair[0])),
            _ => {
                let bits = bits as usize;
                let per_byte = 8 / bits;
                let mask = (1u8 << bits) - 1;
                samples.extend((0..per_row).map(|i| {
                    let shift = 8 - bits * (1 + i % per_byte);
                    (row[i / per_byte] >> shift) & mask
                }));
            }
        }
    }
    Ok(samples)
}

fn scale_sample(value: u8, bits: u8) -> u8 {
    match bits {
        1 => value * 255,
        2 => value * 85,
        4 => value * 17,
        _ => value,
    }
}

fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let white = 255 - k as u16;
    [c, m, y].map(|ink| ((255 - ink as u16) * white / 255) as u8)
}

fn to_pixels(
    color_space: &ImageColorSpace,
    samples: Vec<u8>,
    bits: u8,
    inverted: bool,
) -> Result<Pixels, String> {
    match color_space {
        ImageColorSpace::Indexed {
            base,
            hival,
            palette,
        } => {
            let n = base.components();
            let mut gray = Vec::new();
            let mut rgb = Vec::new();
            for index in samples {
                let i = index.min(*hival) as usize;
                let entry = palette
                    .get(i * n..i * n + n)
                    .ok_or_else(|| "Indexed palette too short".to_string())?;
                match base.as_ref() {
                    ImageColorSpace::Gray => gray.push(entry[0]),
                    ImageColorSpace::Rgb => rgb.extend_from_slice(entry),
                    ImageColorSpace::Cmyk => {
                        rgb.extend(cmyk_to_rgb(entry[0], entry[1], entry[2], entry[3]))
                    }
                    ImageColorSpace::Indexed { .. } => {
                        return Err("nested Indexed color space".to_string())
                    }
                }
            }
            Ok(match base.as_ref() {
                ImageColorSpace::Gray => Pixels::Gray(gray),
                _ => Pixels::Rgb(rgb),
            })
        }
        ImageColorSpace::Gray => Ok(Pixels::Gray(
            samples
                .into_iter()
                .map(|v| {
                    let v = scale_sample(v, bits);
                    if inverted {
                        255 - v
                    } else {
                        v
                    }
                })
                .collect(),
        )),
        ImageColorSpace::Rgb => Ok(Pixels::Rgb(
            samples.into_iter().map(|v| scale_sample(v, bits)).collect(),
        )),
        ImageColorSpace::Cmyk => Ok(Pixels::Rgb(
            samples
                .chunks_exact(4)
                .flat_map(|p| {
                    let [c, m, y, k] = [p[0], p[1], p[2], p[3]].map(|v| scale_sample(v, bits));
                    cmyk_to_rgb(c, m, y, k)
                })
                .collect(),
        )),
    }
}

/// Path of the written image, or why it could not be written.
fn write_for_ocr(
    image: EmbeddedImage,
    dir: &Path,
    page_number: u32,
    index: usize,
) -> Result<Result<PathBuf, String>, ExtractionError> {
    let stem = format!("page{}_img{}", page_number, index);
    match image {
        EmbeddedImage::Jpeg(bytes) => {
            let path = dir.join(format!("{}.jpg", stem));
            std::fs::write(&path, bytes)?;
            Ok(Ok(path))
        }
        EmbeddedImage::Jpx(bytes) => {
            let path = dir.join(format!("{}.jp2", stem));
            std::fs::write(&path, bytes)?;
            Ok(Ok(path))
        }
        EmbeddedImage::Pixels {
            width,
            height,
            pixels,
        } => Ok(write_png(dir.join(format!("{}.png", stem)), width, height, pixels)),
    }
}

#[cfg(feature = "image")]
fn write_png(path: PathBuf, width: u32, height: u32, pixels: Pixels) -> Result<PathBuf, String> {
    let saved = match pixels {
        Pixels::Gray(data) => image::GrayImage::from_raw(width, height, data)
            .map(|img| img.save_with_format(&path, image::ImageFormat::Png)),
        Pixels::Rgb(data) => image::RgbImage::from_raw(width, height, data)
            .map(|img| img.save_with_format(&path, image::ImageFormat::Png)),
    };
    match saved {
        Some(Ok(())) => Ok(path),
        Some(Err(e)) => Err(format!("PNG encode failed: {}", e)),
        None => Err("pixel buffer does not match image size".to_string()),
    }
}

#[cfg(not(feature = "image"))]
fn write_png(_path: PathBuf, _width: u32, _height: u32, _pixels: Pixels) -> Result<PathBuf, String> {
    Err("raw image decoding disabled (image feature off)".to_string())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, ObjectId, Stream};

    /// Build a PDF where page `n` shows the text `Page n` and, when `with_image`
    /// is set, draws one 2x2 DCT image.
    pub fn build_pdf(pages: u32, with_image: bool) -> Vec<u8> {
        build(pages, |doc| {
            with_image.then(|| {
                doc.add_object(Stream::new(
                    dictionary! {
                        "Type" => "XObject",
                        "Subtype" => "Image",
                        "Width" => 2,
                        "Height" => 2,
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 8,
                        "Filter" => "DCTDecode",
                    },
                    vec![0xFF, 0xD8, 0xFF, 0xD9],
                ))
            })
        })
    }

    /// Single-page PDF drawing the image object `make_image` adds.
    pub fn build_pdf_with_image(make_image: impl Fn(&mut Document) -> ObjectId) -> Vec<u8> {
        build(1, |doc| Some(make_image(doc)))
    }

    /// Image XObject dictionary with the given size and extra entries.
    pub fn image_dict(width: i64, height: i64, extra: lopdf::Dictionary) -> lopdf::Dictionary {
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
        };
        for (key, value) in extra.into_iter() {
            dict.set(key, value);
        }
        dict
    }

    fn build(pages: u32, mut image_for_page: impl FnMut(&mut Document) -> Option<ObjectId>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });

        let mut kids: Vec<Object> = Vec::new();
        for n in 1..=pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {}", n))]),
                Operation::new("ET", vec![]),
            ];
            let mut resources = dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            };
            if let Some(image_id) = image_for_page(&mut doc) {
                resources.set("XObject", dictionary! { "Im1" => image_id });
                operations.push(Operation::new("Do", vec!["Im1".into()]));
            }

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("content encodes"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("pdf saves");
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{build_pdf, build_pdf_with_image, image_dict};
    use super::*;
    use crate::extract::test_support::{ScriptedExporter, ScriptedOcr};
    use lopdf::{dictionary, StringFormat};

    fn write_pdf(dir: &Path, pages: u32, with_image: bool) -> PathBuf {
        let path = dir.join("doc.pdf");
        std::fs::write(&path, build_pdf(pages, with_image)).unwrap();
        path
    }

    fn write_image_pdf(dir: &Path, make_image: impl Fn(&mut Document) -> ObjectId) -> PathBuf {
        let path = dir.join("scan.pdf");
        std::fs::write(&path, build_pdf_with_image(make_image)).unwrap();
        path
    }

    fn run(path: &Path, ocr: &dyn OcrEngine, exporter: &ScriptedExporter) -> (String, Vec<String>) {
        let mut warnings = Vec::new();
        let text = extract_pdf(path, ocr, exporter, &mut warnings).unwrap();
        (text, warnings)
    }

    #[test]
    fn text_layer_in_page_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), 3, false);
        let ocr = ScriptedOcr::default();

        let (text, warnings) = run(&path, &ocr, &ScriptedExporter::default());
        let p1 = text.find("Page 1").unwrap();
        let p2 = text.find("Page 2").unwrap();
        let p3 = text.find("Page 3").unwrap();
        assert!(p1 < p2 && p2 < p3);
        assert!(ocr.seen.lock().unwrap().is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn image_text_follows_its_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), 2, true);
        let ocr = ScriptedOcr {
            text: "STAMPED".to_string(),
            ..Default::default()
        };

        let (text, _) = run(&path, &ocr, &ScriptedExporter::default());
        assert_eq!(ocr.seen.lock().unwrap().len(), 2);

        let page1 = text.find("Page 1").unwrap();
        let first_stamp = text.find("STAMPED").unwrap();
        let page2 = text.find("Page 2").unwrap();
        assert!(page1 < first_stamp && first_stamp < page2);
        assert!(text.rfind("STAMPED").unwrap() > page2);
    }

    #[test]
    fn ocr_failure_fails_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), 1, true);
        let ocr = ScriptedOcr {
            fail: true,
            ..Default::default()
        };

        let mut warnings = Vec::new();
        assert!(matches!(
            extract_pdf(&path, &ocr, &ScriptedExporter::default(), &mut warnings),
            Err(ExtractionError::ToolNotFound(_))
        ));
    }

    #[test]
    fn fax_and_jbig2_images_are_exported_for_ocr() {
        for filter in ["CCITTFaxDecode", "JBIG2Decode"] {
            let dir = tempfile::tempdir().unwrap();
            let path = write_image_pdf(dir.path(), |doc| {
                doc.add_object(Stream::new(
                    image_dict(
                        16,
                        16,
                        dictionary! {
                            "ColorSpace" => "DeviceGray",
                            "BitsPerComponent" => 1,
                            "Filter" => filter,
                        },
                    ),
                    vec![0x00; 8],
                ))
            });
            let ocr = ScriptedOcr {
                text: "FAXED".to_string(),
                ..Default::default()
            };
            let exporter = ScriptedExporter::writing(1);

            let (text, warnings) = run(&path, &ocr, &exporter);
            assert_eq!(*exporter.pages.lock().unwrap(), vec![1], "{}", filter);
            assert_eq!(ocr.seen.lock().unwrap().len(), 1, "{}", filter);
            assert!(text.contains("FAXED"), "{}", filter);
            assert!(warnings.is_empty(), "{}", filter);
        }
    }

    #[test]
    fn unreadable_image_without_exporter_is_a_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image_pdf(dir.path(), |doc| {
            doc.add_object(Stream::new(
                image_dict(
                    8,
                    8,
                    dictionary! {
                        "ColorSpace" => "DeviceGray",
                        "BitsPerComponent" => 1,
                        "Filter" => "CCITTFaxDecode",
                    },
                ),
                vec![0x00; 8],
            ))
        });
        let ocr = ScriptedOcr::default();
        let exporter = ScriptedExporter::failing();

        let (text, warnings) = run(&path, &ocr, &exporter);
        assert!(text.contains("Page 1"));
        assert!(ocr.seen.lock().unwrap().is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("page 1"));
        assert!(warnings[0].contains("CCITTFaxDecode"));
    }

    #[test]
    fn jpeg_2000_is_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image_pdf(dir.path(), |doc| {
            doc.add_object(Stream::new(
                image_dict(2, 2, dictionary! { "Filter" => "JPXDecode" }),
                vec![0x00, 0x00, 0x00, 0x0C, b'j', b'P', b' ', b' '],
            ))
        });
        let ocr = ScriptedOcr::default();
        let exporter = ScriptedExporter::default();

        run(&path, &ocr, &exporter);
        let seen = ocr.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].extension().unwrap(), "jp2");
        assert!(exporter.pages.lock().unwrap().is_empty());
    }

    #[test]
    fn separation_color_space_goes_to_the_exporter() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_image_pdf(dir.path(), |doc| {
            doc.add_object(Stream::new(
                image_dict(
                    2,
                    2,
                    dictionary! {
                        "ColorSpace" => vec![
                            Object::Name(b"Separation".to_vec()),
                            Object::Name(b"Spot".to_vec()),
                            Object::Name(b"DeviceCMYK".to_vec()),
                            Object::Null,
                        ],
                        "BitsPerComponent" => 8,
                    },
                ),
                vec![0x00; 4],
            ))
        });
        let exporter = ScriptedExporter::writing(1);

        run(&path, &ScriptedOcr::default(), &exporter);
        assert_eq!(*exporter.pages.lock().unwrap(), vec![1]);
    }

    #[test]
    fn unpacks_padded_one_bit_rows() {
        // 3 pixels per row, padded to one byte per row.
        let samples = unpack_samples(&[0b1010_0000, 0b0110_0000], 3, 2, 1, 1).unwrap();
        assert_eq!(samples, vec![1, 0, 1, 0, 1, 1]);
    }

    #[test]
    fn unpacks_two_and_sixteen_bit_samples() {
        assert_eq!(
            unpack_samples(&[0b1110_0100], 4, 1, 1, 2).unwrap(),
            vec![3, 2, 1, 0]
        );
        assert_eq!(
            unpack_samples(&[0xAB, 0xCD, 0x12, 0x34], 2, 1, 1, 16).unwrap(),
            vec![0xAB, 0x12]
        );
    }

    #[test]
    fn short_image_data_is_rejected() {
        assert!(unpack_samples(&[0x00; 5], 2, 2, 3, 8).is_err());
    }

    #[test]
    fn cmyk_converts_to_rgb() {
        let pixels = to_pixels(&ImageColorSpace::Cmyk, vec![255, 0, 0, 0, 0, 0, 0, 255], 8, false)
            .unwrap();
        assert_eq!(pixels, Pixels::Rgb(vec![0, 255, 255, 0, 0, 0]));
    }

    #[test]
    fn indexed_expands_through_the_palette() {
        let space = ImageColorSpace::Indexed {
            base: Box::new(ImageColorSpace::Rgb),
            hival: 1,
            palette: vec![255, 0, 0, 0, 0, 255],
        };
        // Out-of-range indices clamp to hival.
        let pixels = to_pixels(&space, vec![1, 0, 7], 8, false).unwrap();
        assert_eq!(pixels, Pixels::Rgb(vec![0, 0, 255, 255, 0, 0, 0, 0, 255]));
    }

    #[test]
    fn inverted_bilevel_decode() {
        let pixels = to_pixels(&ImageColorSpace::Gray, vec![0, 1], 1, true).unwrap();
        assert_eq!(pixels, Pixels::Gray(vec![255, 0]));
    }

    #[test]
    fn reads_color_space_from_the_pdf() {
        let mut doc = Document::with_version("1.5");
        let icc = doc.add_object(Stream::new(dictionary! { "N" => 4 }, vec![]));
        let icc_space = Object::Array(vec![Object::Name(b"ICCBased".to_vec()), icc.into()]);
        assert_eq!(
            parse_color_space(&doc, &icc_space, 0).unwrap(),
            ImageColorSpace::Cmyk
        );

        let indexed = Object::Array(vec![
            Object::Name(b"Indexed".to_vec()),
            Object::Name(b"DeviceGray".to_vec()),
            Object::Integer(1),
            Object::String(vec![0, 255], StringFormat::Hexadecimal),
        ]);
        assert_eq!(
            parse_color_space(&doc, &indexed, 0).unwrap(),
            ImageColorSpace::Indexed {
                base: Box::new(ImageColorSpace::Gray),
                hival: 1,
                palette: vec![0, 255],
            }
        );
    }

    #[cfg(feature = "image")]
    mod decoded {
        use super::*;
        use std::sync::Mutex;

        /// OCR engine that opens each image and records its size and first pixel.
        #[derive(Default)]
        struct PixelOcr {
            seen: Mutex<Vec<(u32, u32, [u8; 3])>>,
        }

        impl OcrEngine for PixelOcr {
            fn ocr_image(&self, image_path: &Path) -> Result<String, ExtractionError> {
                let img = image::open(image_path)
                    .map_err(|e| ExtractionError::parse("test", e))?
                    .to_rgb8();
                self.seen.lock().unwrap().push((
                    img.width(),
                    img.height(),
                    img.get_pixel(0, 0).0,
                ));
                Ok("SCANNED".to_string())
            }
        }

        fn decode(make_image: impl Fn(&mut Document) -> ObjectId) -> (u32, u32, [u8; 3]) {
            let dir = tempfile::tempdir().unwrap();
            let path = write_image_pdf(dir.path(), make_image);
            let ocr = PixelOcr::default();
            let exporter = ScriptedExporter::default();

            let (text, warnings) = run(&path, &ocr, &exporter);
            assert!(text.contains("SCANNED"));
            assert!(warnings.is_empty(), "{:?}", warnings);
            assert!(exporter.pages.lock().unwrap().is_empty());
            let seen = ocr.seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            seen[0]
        }

        #[test]
        fn bilevel_scan_is_decoded_natively() {
            let seen = decode(|doc| {
                doc.add_object(Stream::new(
                    image_dict(
                        8,
                        2,
                        dictionary! {
                            "ColorSpace" => "DeviceGray",
                            "BitsPerComponent" => 1,
                        },
                    ),
                    vec![0b0111_1111, 0b1111_1111],
                ))
            });
            assert_eq!(seen, (8, 2, [0, 0, 0]));
        }

        #[test]
        fn flate_cmyk_is_converted() {
            let seen = decode(|doc| {
                let mut stream = Stream::new(
                    image_dict(
                        16,
                        16,
                        dictionary! {
                            "ColorSpace" => "DeviceCMYK",
                            "BitsPerComponent" => 8,
                        },
                    ),
                    [255u8, 0, 0, 0].repeat(16 * 16),
                );
                stream.compress().unwrap();
                assert!(stream.dict.get(b"Filter").is_ok());
                doc.add_object(stream)
            });
            assert_eq!(seen, (16, 16, [0, 255, 255]));
        }

        #[test]
        fn indexed_palette_is_expanded() {
            let seen = decode(|doc| {
                doc.add_object(Stream::new(
                    image_dict(
                        2,
                        1,
                        dictionary! {
                            "ColorSpace" => vec![
                                Object::Name(b"Indexed".to_vec()),
                                Object::Name(b"DeviceRGB".to_vec()),
                                Object::Integer(1),
                                Object::String(vec![255, 0, 0, 0, 0, 255], StringFormat::Hexadecimal),
                            ],
                            "BitsPerComponent" => 8,
                        },
                    ),
                    vec![1, 0],
                ))
            });
            assert_eq!(seen, (2, 1, [0, 0, 255]));
        }

        #[test]
        fn icc_gray_image_mask_and_raw_rgb() {
            let gray = decode(|doc| {
                let icc = doc.add_object(Stream::new(dictionary! { "N" => 1 }, vec![]));
                doc.add_object(Stream::new(
                    image_dict(
                        2,
                        2,
                        dictionary! {
                            "ColorSpace" => vec![Object::Name(b"ICCBased".to_vec()), icc.into()],
                            "BitsPerComponent" => 8,
                        },
                    ),
                    vec![128; 4],
                ))
            });
            assert_eq!(gray, (2, 2, [128, 128, 128]));

            let mask = decode(|doc| {
                doc.add_object(Stream::new(
                    image_dict(8, 1, dictionary! { "ImageMask" => true }),
                    vec![0b1000_0000],
                ))
            });
            assert_eq!(mask, (8, 1, [255, 255, 255]));

            let rgb = decode(|doc| {
                doc.add_object(Stream::new(
                    image_dict(
                        1,
                        1,
                        dictionary! {
                            "ColorSpace" => "DeviceRGB",
                            "BitsPerComponent" => 8,
                        },
                    ),
                    vec![10, 20, 30],
                ))
            });
            assert_eq!(rgb, (1, 1, [10, 20, 30]));
        }
    }

    #[test]
    fn counts_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pdf(dir.path(), 4, false);
        assert_eq!(page_count(&path).unwrap(), 4);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"%PDF-1.4\ngarbage").unwrap();
        let mut warnings = Vec::new();
        assert!(matches!(
            extract_pdf(
                &path,
                &ScriptedOcr::default(),
                &ScriptedExporter::default(),
                &mut warnings
            ),
            Err(ExtractionError::Parse { .. })
        ));
    }
}
