//! Normalizing the ways an image can arrive (URL, pasted bytes, dropped
//! file) into the one `src` string the model stores.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Html,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IngestError {
    #[error("image payload is empty")]
    EmptyImage,
    #[error("malformed markup: {0}")]
    Markup(String),
    #[error("image processing failed: {0}")]
    Processing(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Url(String),
    DataUri(String),
    /// Pasted from the clipboard.
    Bytes { data: Vec<u8>, mime: String },
    /// Dropped or picked as a file.
    File {
        name: String,
        data: Vec<u8>,
        mime: String,
    },
}

impl ImageSource {
    /// The `src` string for an image void. Raw bytes become a base64
    /// `data:` URI; an empty payload is an error, never an empty string.
    pub fn resolve(&self) -> Result<String, IngestError> {
        match self {
            ImageSource::Url(url) if !url.is_empty() => Ok(url.clone()),
            ImageSource::DataUri(uri) if !uri.is_empty() => Ok(uri.clone()),
            ImageSource::Bytes { data, mime } | ImageSource::File { data, mime, .. } => {
                if data.is_empty() {
                    return Err(IngestError::EmptyImage);
                }
                Ok(format!("data:{mime};base64,{}", STANDARD.encode(data)))
            }
            _ => Err(IngestError::EmptyImage),
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        match self {
            ImageSource::File { name, .. } => Some(name),
            _ => None,
        }
    }
}
