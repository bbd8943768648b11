//! Extension selection for stored media.
//!
//! The file signature wins when it identifies a concrete format. Generic
//! containers (zip, which also covers docx/xlsx/...) fall through to the
//! declared MIME type and then the original file name.

/// Extension used when nothing identifies the format.
pub const DEFAULT_EXTENSION: &str = "bin";

const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("video/mp4", "mp4"),
    ("video/3gpp", "3gp"),
    ("video/quicktime", "mov"),
    ("audio/ogg", "ogg"),
    ("audio/mpeg", "mp3"),
    ("audio/mp4", "m4a"),
    ("audio/aac", "aac"),
    ("audio/wav", "wav"),
    ("application/pdf", "pdf"),
    ("application/zip", "zip"),
    ("text/plain", "txt"),
    ("text/vcard", "vcf"),
    ("text/x-vcard", "vcf"),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "docx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xlsx",
    ),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "pptx",
    ),
];

/// Identify a format from its leading bytes.
pub fn sniff(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("jpg");
    }
    if data.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some("png");
    }
    if data.starts_with(b"GIF8") {
        return Some("gif");
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") {
        return match &data[8..12] {
            b"WEBP" => Some("webp"),
            b"WAVE" => Some("wav"),
            _ => None,
        };
    }
    if data.starts_with(b"OggS") {
        return Some("ogg");
    }
    if data.starts_with(b"%PDF") {
        return Some("pdf");
    }
    if data.starts_with(b"ID3") || data.starts_with(&[0xFF, 0xFB]) {
        return Some("mp3");
    }
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        return match &data[8..12] {
            b"M4A " => Some("m4a"),
            b"qt  " => Some("mov"),
            b"3gp4" | b"3gp5" => Some("3gp"),
            _ => Some("mp4"),
        };
    }
    if data.starts_with(&[b'P', b'K', 0x03, 0x04]) {
        return Some("zip");
    }
    None
}

/// Extension for a declared MIME type; parameters (`; codecs=opus`) are ignored.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    MIME_EXTENSIONS
        .iter()
        .find(|(m, _)| m.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
}

/// Extension of an original file name, if it is short and alphanumeric.
pub fn extension_from_file_name(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn choose_extension(data: &[u8], mime: Option<&str>, file_name: Option<&str>) -> String {
    let sniffed = sniff(data);
    if let Some(ext) = sniffed.filter(|ext| *ext != "zip") {
        return ext.to_string();
    }
    if let Some(ext) = mime.and_then(extension_for_mime) {
        return ext.to_string();
    }
    if let Some(ext) = file_name.and_then(extension_from_file_name) {
        return ext;
    }
    sniffed.unwrap_or(DEFAULT_EXTENSION).to_string()
}
