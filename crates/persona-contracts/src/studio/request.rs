use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{Map, Value};

use crate::catalog::{
    default_archetype, default_style, find_archetype, find_style, Archetype, ArtStyle, Gender,
    ImageSize,
};

use super::error::{GenerationError, StudioError};

/// MIME label used for every data URI, whatever the service declared.
pub const DATA_URI_MIME: &str = "image/png";

/// The four selection axes. Doubles as the request snapshot handed to a
/// generator, since a request is exactly the selection at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest {
    pub archetype: &'static Archetype,
    pub style: &'static ArtStyle,
    pub gender: Gender,
    pub size: ImageSize,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            archetype: default_archetype(),
            style: default_style(),
            gender: Gender::default(),
            size: ImageSize::default(),
        }
    }
}

impl GenerationRequest {
    pub fn download_file_name(&self) -> String {
        format!(
            "persona-gen-{}-{}-{}.png",
            self.archetype.code,
            self.style.id,
            self.size.label()
        )
    }

    pub fn event_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            "archetype".to_string(),
            Value::String(self.archetype.code.to_string()),
        );
        fields.insert("style".to_string(), Value::String(self.style.id.to_string()));
        fields.insert(
            "gender".to_string(),
            Value::String(self.gender.label().to_string()),
        );
        fields.insert(
            "size".to_string(),
            Value::String(self.size.label().to_string()),
        );
        fields
    }

    pub(crate) fn apply(&mut self, change: SelectionChange) -> bool {
        let before = *self;
        match change {
            SelectionChange::Archetype(archetype) => self.archetype = archetype,
            SelectionChange::Style(style) => self.style = style,
            SelectionChange::Gender(gender) => self.gender = gender,
            SelectionChange::Size(size) => self.size = size,
        }
        before != *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionAxis {
    Archetype,
    Style,
    Gender,
    Size,
}

impl SelectionAxis {
    pub const ALL: [SelectionAxis; 4] = [
        SelectionAxis::Archetype,
        SelectionAxis::Style,
        SelectionAxis::Gender,
        SelectionAxis::Size,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Archetype => "archetype",
            Self::Style => "style",
            Self::Gender => "gender",
            Self::Size => "size",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|axis| axis.key() == key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    Archetype(&'static Archetype),
    Style(&'static ArtStyle),
    Gender(Gender),
    Size(ImageSize),
}

impl SelectionChange {
    pub fn parse(axis: SelectionAxis, raw: &str) -> Result<Self, StudioError> {
        let value = raw.trim();
        match axis {
            SelectionAxis::Archetype => find_archetype(value)
                .map(Self::Archetype)
                .ok_or_else(|| {
                    StudioError::InvalidSelection(format!("Unknown personality type '{value}'."))
                }),
            SelectionAxis::Style => find_style(value).map(Self::Style).ok_or_else(|| {
                StudioError::InvalidSelection(format!("Unknown art style '{value}'."))
            }),
            SelectionAxis::Gender => value
                .parse::<Gender>()
                .map(Self::Gender)
                .map_err(StudioError::InvalidSelection),
            SelectionAxis::Size => value
                .parse::<ImageSize>()
                .map(Self::Size)
                .map_err(StudioError::InvalidSelection),
        }
    }

    /// Classifies a free token against every axis, archetypes first.
    pub fn guess(token: &str) -> Option<Self> {
        SelectionAxis::ALL
            .into_iter()
            .find_map(|axis| Self::parse(axis, token).ok())
    }

    pub fn axis(&self) -> SelectionAxis {
        match self {
            Self::Archetype(_) => SelectionAxis::Archetype,
            Self::Style(_) => SelectionAxis::Style,
            Self::Gender(_) => SelectionAxis::Gender,
            Self::Size(_) => SelectionAxis::Size,
        }
    }

    pub fn value_label(&self) -> &'static str {
        match self {
            Self::Archetype(archetype) => archetype.code,
            Self::Style(style) => style.id,
            Self::Gender(gender) => gender.label(),
            Self::Size(size) => size.label(),
        }
    }
}

/// Encoded image bytes returned by a generator.
///
/// Cloning is cheap; the bytes are shared between the current result and the
/// history entry that recorded them.
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Arc<[u8]>,
    declared_mime: Option<String>,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, declared_mime: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            declared_mime,
        }
    }

    pub fn from_base64(data: &str, declared_mime: Option<String>) -> Result<Self, GenerationError> {
        let bytes = BASE64
            .decode(data.trim().as_bytes())
            .map_err(|err| GenerationError::InvalidImageData(err.to_string()))?;
        Ok(Self::new(bytes, declared_mime))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encoding reported by the service, if any. Not reflected in
    /// [`ImagePayload::data_uri`], which is always labelled PNG.
    pub fn declared_mime(&self) -> Option<&str> {
        self.declared_mime.as_deref()
    }

    pub fn data_uri(&self) -> String {
        format!("{}{}", data_uri_header(), BASE64.encode(&self.bytes))
    }

    /// Length of [`ImagePayload::data_uri`], computed without encoding.
    pub fn data_uri_len(&self) -> usize {
        data_uri_header().len() + self.bytes.len().div_ceil(3) * 4
    }

    /// The first `max_chars` characters of [`ImagePayload::data_uri`].
    /// Only the leading bytes that reach the output are encoded.
    pub fn data_uri_prefix(&self, max_chars: usize) -> String {
        let mut uri = data_uri_header();
        let remaining = max_chars.saturating_sub(uri.len());
        let needed = (remaining.div_ceil(4) * 3).min(self.bytes.len());
        uri.push_str(&BASE64.encode(&self.bytes[..needed]));
        uri.truncate(max_chars);
        uri
    }
}

fn data_uri_header() -> String {
    format!("data:{DATA_URI_MIME};base64,")
}

impl fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImagePayload")
            .field("len", &self.bytes.len())
            .field("declared_mime", &self.declared_mime)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{find_archetype, find_style, Gender, ImageSize};

    use super::{
        GenerationError, GenerationRequest, ImagePayload, SelectionAxis, SelectionChange,
        StudioError,
    };

    #[test]
    fn download_file_name_is_derived_from_code_style_and_size() {
        let request = GenerationRequest {
            archetype: find_archetype("INTJ").unwrap(),
            style: find_style("cyberpunk").unwrap(),
            gender: Gender::Male,
            size: ImageSize::TwoK,
        };
        assert_eq!(
            request.download_file_name(),
            "persona-gen-INTJ-cyberpunk-2K.png"
        );
    }

    #[test]
    fn default_request_uses_first_catalog_entries() {
        let request = GenerationRequest::default();
        assert_eq!(request.archetype.code, "INTJ");
        assert_eq!(request.style.id, "anime");
        assert_eq!(request.gender, Gender::Female);
        assert_eq!(request.size, ImageSize::OneK);
    }

    #[test]
    fn parse_rejects_values_outside_catalog() {
        let err = SelectionChange::parse(SelectionAxis::Archetype, "ABCD").unwrap_err();
        assert_eq!(
            err,
            StudioError::InvalidSelection("Unknown personality type 'ABCD'.".to_string())
        );
        assert!(SelectionChange::parse(SelectionAxis::Style, "vaporwave").is_err());
    }

    #[test]
    fn guess_classifies_tokens_per_axis() {
        assert_eq!(
            SelectionChange::guess("enfp").map(|c| c.axis()),
            Some(SelectionAxis::Archetype)
        );
        assert_eq!(
            SelectionChange::guess("watercolor").map(|c| c.value_label()),
            Some("watercolor")
        );
        assert_eq!(
            SelectionChange::guess("nb"),
            Some(SelectionChange::Gender(Gender::NonBinary))
        );
        assert_eq!(
            SelectionChange::guess("4k"),
            Some(SelectionChange::Size(ImageSize::FourK))
        );
        assert_eq!(SelectionChange::guess("please"), None);
    }

    #[test]
    fn data_uri_is_always_labelled_png() -> anyhow::Result<()> {
        let payload = ImagePayload::from_base64("aGVsbG8=", Some("image/jpeg".to_string()))?;
        assert_eq!(payload.bytes(), b"hello");
        assert_eq!(payload.declared_mime(), Some("image/jpeg"));
        assert_eq!(payload.data_uri(), "data:image/png;base64,aGVsbG8=");
        Ok(())
    }

    #[test]
    fn data_uri_prefix_matches_full_encoding() {
        let payload = ImagePayload::new((0u8..=200).collect(), None);
        let full = payload.data_uri();
        assert_eq!(payload.data_uri_len(), full.len());
        for max_chars in [0, 5, 22, 23, 26, 48, 60, full.len(), full.len() + 10] {
            let expected: String = full.chars().take(max_chars).collect();
            assert_eq!(payload.data_uri_prefix(max_chars), expected, "max_chars={max_chars}");
        }

        let empty = ImagePayload::new(Vec::new(), None);
        assert_eq!(empty.data_uri_len(), "data:image/png;base64,".len());
        assert_eq!(empty.data_uri_prefix(48), "data:image/png;base64,");
    }

    #[test]
    fn invalid_base64_is_reported() {
        let err = ImagePayload::from_base64("***", None).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidImageData(_)));
    }
}
