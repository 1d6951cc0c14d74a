use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use image::ImageFormat;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::SyncError;

/// Stored when a photo carries no usable capture date.
pub const SENTINEL_CREATED: &str = "1901-01-01 00:00:00";

/// Format used for capture dates in the catalog.
pub const CREATED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Windows `XPKeywords` (UCS-2, semicolon separated).
const XP_KEYWORDS: exif::Tag = exif::Tag(exif::Context::Tiff, 0x9c9e);

/// XMP packets sit near the start of the file; don't read whole photos.
const XMP_SCAN_LIMIT: u64 = 1024 * 1024;

/// JPEG APP13 marker, which carries Photoshop image resources.
const APP13: u8 = 0xED;
const PHOTOSHOP_SIGNATURE: &[u8] = b"Photoshop 3.0\0";
/// Image resource holding the IPTC-IIM block.
const IPTC_RESOURCE_ID: u16 = 0x0404;
/// IIM application record and its `Keywords` dataset (2:25).
const IIM_APPLICATION: u8 = 2;
const IIM_KEYWORDS: u8 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Square,
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if height == width {
            Orientation::Square
        } else if width > height {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }

    /// Single-letter code kept in the catalog.
    pub fn as_code(&self) -> &'static str {
        match self {
            Orientation::Square => "S",
            Orientation::Horizontal => "H",
            Orientation::Vertical => "V",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PhotoMetadata {
    /// File name; the photo's identity in the catalog.
    pub name: String,
    /// Upper-case format name, e.g. `JPEG`.
    pub file_type: String,
    pub format: ImageFormat,
    pub size_bytes: u64,
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
    pub created: NaiveDateTime,
    pub keywords: Vec<String>,
}

impl PhotoMetadata {
    pub fn created_text(&self) -> String {
        self.created.format(CREATED_FORMAT).to_string()
    }

    pub fn keywords_text(&self) -> String {
        self.keywords.join(" ")
    }
}

pub fn sentinel_created() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1901, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

pub fn file_type_name(format: ImageFormat) -> String {
    match format {
        ImageFormat::Jpeg => "JPEG".to_string(),
        ImageFormat::Png => "PNG".to_string(),
        ImageFormat::Gif => "GIF".to_string(),
        ImageFormat::WebP => "WEBP".to_string(),
        ImageFormat::Tiff => "TIFF".to_string(),
        ImageFormat::Bmp => "BMP".to_string(),
        other => format!("{:?}", other).to_uppercase(),
    }
}

/// Read everything the catalog and transfer steps need from one photo.
///
/// A file whose image header can't be decoded is an error; missing EXIF is
/// not, it just yields no keywords and the sentinel date.
pub fn extract_metadata(path: &Path) -> Result<PhotoMetadata> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let size_bytes = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();

    let reader = image::ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_guessed_format()?;
    let format = reader.format().ok_or_else(|| SyncError::UnsupportedFormat {
        name: name.clone(),
        file_type: "unknown".to_string(),
    })?;
    let (width, height) = reader
        .into_dimensions()
        .with_context(|| format!("Failed to read dimensions of {}", path.display()))?;

    let exif = read_exif(path);
    let created = exif
        .as_ref()
        .and_then(capture_date)
        .unwrap_or_else(sentinel_created);

    let head = read_head(path, XMP_SCAN_LIMIT)?;
    let mut keywords = iptc_keywords(&head);
    let xp = exif.as_ref().map(xp_keywords).unwrap_or_default();
    for keyword in xmp_subjects(&head).into_iter().chain(xp) {
        if !keywords.contains(&keyword) {
            keywords.push(keyword);
        }
    }

    Ok(PhotoMetadata {
        name,
        file_type: file_type_name(format),
        format,
        size_bytes,
        width,
        height,
        orientation: Orientation::from_dimensions(width, height),
        created,
        keywords,
    })
}

fn read_exif(path: &Path) -> Option<exif::Exif> {
    let file = File::open(path).ok()?;
    let mut bufreader = BufReader::new(file);
    match exif::Reader::new().read_from_container(&mut bufreader) {
        Ok(exif) => Some(exif),
        Err(e) => {
            tracing::debug!("No EXIF in {}: {}", path.display(), e);
            None
        }
    }
}

/// CreateDate, then ModifyDate.
fn capture_date(exif: &exif::Exif) -> Option<NaiveDateTime> {
    [exif::Tag::DateTimeDigitized, exif::Tag::DateTime]
        .iter()
        .filter_map(|tag| exif.get_field(*tag, exif::In::PRIMARY))
        .find_map(|field| match field.value {
            exif::Value::Ascii(ref v) => v.first().and_then(|raw| parse_exif_datetime(raw)),
            _ => None,
        })
}

fn parse_exif_datetime(raw: &[u8]) -> Option<NaiveDateTime> {
    let dt = exif::DateTime::from_ascii(raw).ok()?;
    NaiveDate::from_ymd_opt(dt.year as i32, dt.month as u32, dt.day as u32)?.and_hms_opt(
        dt.hour as u32,
        dt.minute as u32,
        dt.second as u32,
    )
}

fn xp_keywords(exif: &exif::Exif) -> Vec<String> {
    let Some(field) = exif.get_field(XP_KEYWORDS, exif::In::PRIMARY) else {
        return Vec::new();
    };
    let exif::Value::Byte(ref bytes) = field.value else {
        return Vec::new();
    };
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0)
        .collect();
    String::from_utf16_lossy(&units)
        .split(';')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect()
}

fn read_head(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .take(limit)
        .read_to_end(&mut buf)?;
    Ok(buf)
}

/// Entries of the XMP `dc:subject` bag, in document order.
fn xmp_subjects(data: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(data);
    let Some(start) = text.find("<dc:subject") else {
        return Vec::new();
    };
    let rest = &text[start..];
    let block = &rest[..rest.find("</dc:subject>").unwrap_or(rest.len())];

    let mut subjects: Vec<String> = Vec::new();
    for item in block.split("<rdf:li").skip(1) {
        let Some(open_end) = item.find('>') else {
            continue;
        };
        let body = &item[open_end + 1..];
        let Some(close) = body.find("</rdf:li>") else {
            continue;
        };
        let subject = unescape_xml(body[..close].trim());
        if !subject.is_empty() && !subjects.contains(&subject) {
            subjects.push(subject);
        }
    }
    subjects
}

/// IPTC `Keywords` from the Photoshop APP13 segments of a JPEG, in order.
fn iptc_keywords(data: &[u8]) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for segment in jpeg_segments(data, APP13) {
        let Some(resources) = segment.strip_prefix(PHOTOSHOP_SIGNATURE) else {
            continue;
        };
        for block in photoshop_resources(resources, IPTC_RESOURCE_ID) {
            for keyword in iim_values(block, IIM_APPLICATION, IIM_KEYWORDS) {
                if !keywords.contains(&keyword) {
                    keywords.push(keyword);
                }
            }
        }
    }
    keywords
}

/// Payloads of every `marker` segment before the scan data starts.
fn jpeg_segments(data: &[u8], marker: u8) -> Vec<&[u8]> {
    let mut segments = Vec::new();
    if !data.starts_with(&[0xFF, 0xD8]) {
        return segments;
    }

    let mut pos = 2;
    while pos + 4 <= data.len() && data[pos] == 0xFF {
        let current = data[pos + 1];
        if current == 0xFF {
            pos += 1;
            continue;
        }
        // SOS or EOI: no more metadata segments.
        if current == 0xDA || current == 0xD9 {
            break;
        }
        let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let Some(payload) = data.get(pos + 4..pos + 2 + len.max(2)) else {
            break;
        };
        if current == marker {
            segments.push(payload);
        }
        pos += 2 + len.max(2);
    }
    segments
}

/// Bodies of the `8BIM` resources with id `wanted`.
fn photoshop_resources(mut data: &[u8], wanted: u16) -> Vec<&[u8]> {
    let mut found = Vec::new();
    while data.len() >= 12 && data.starts_with(b"8BIM") {
        let id = u16::from_be_bytes([data[4], data[5]]);
        // Pascal string name, padded so length byte plus text is even.
        let size_at = 6 + ((data[6] as usize + 2) & !1);
        let Some(size) = data.get(size_at..size_at + 4) else {
            break;
        };
        let size = u32::from_be_bytes([size[0], size[1], size[2], size[3]]) as usize;
        let start = size_at + 4;
        let Some(body) = data.get(start..start + size) else {
            break;
        };
        if id == wanted {
            found.push(body);
        }
        data = data.get(start + size + (size & 1)..).unwrap_or_default();
    }
    found
}

/// Values of IIM dataset `record:dataset`, trimmed, empty ones dropped.
fn iim_values(mut data: &[u8], record: u8, dataset: u8) -> Vec<String> {
    let mut values = Vec::new();
    while data.len() >= 5 && data[0] == 0x1C {
        let size = u16::from_be_bytes([data[3], data[4]]) as usize;
        // Extended-length datasets only hold bulk data, never keywords.
        if size & 0x8000 != 0 {
            break;
        }
        let Some(body) = data.get(5..5 + size) else {
            break;
        };
        if data[1] == record && data[2] == dataset {
            let value = String::from_utf8_lossy(body).trim().to_string();
            if !value.is_empty() {
                values.push(value);
            }
        }
        data = &data[5 + size..];
    }
    values
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
