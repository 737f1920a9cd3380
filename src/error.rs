use std::str::Utf8Error;
use thiserror::Error;
use wasm_bindgen::JsValue;

/// Errors that reject a whole document conversion.
///
/// Per-point problems (missing coordinates, privacy redaction) never surface
/// here; those records are dropped while the rest of the document converts.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("Malformed XML: {0}")]
    Malformed(String),

    #[error("KMZ archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Invalid UTF-8 in {context}: {source}")]
    InvalidUtf8 {
        context: &'static str,
        source: Utf8Error,
    },

    #[error("No .kml document found in KMZ archive")]
    SourceNotFound,
}

impl MapError {
    /// True for every failure caused by unreadable input, as opposed to a
    /// readable archive that simply holds no KML.
    pub fn is_parse_failure(&self) -> bool {
        !matches!(self, Self::SourceNotFound)
    }
}

pub type Result<T> = std::result::Result<T, MapError>;

impl From<MapError> for JsValue {
    fn from(e: MapError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
