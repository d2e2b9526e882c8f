//! The locally selected file and how it is previewed
use std::path::{Path, PathBuf};

use bytes::Bytes;
use mime::Mime;

use crate::error::{CactusError, Result};

/// Coarse content-type family, resolved once from the MIME string
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    Image,
    Audio,
    Video,
    Pdf,
    Spreadsheet,
    Presentation,
    Archive,
    Text,
    Other,
}

/// Placeholder shown when a pixel preview is not available
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Glyph {
    pub icon: &'static str,
    pub color: &'static str,
}

impl FileKind {
    pub fn from_mime(content_type: &str) -> Self {
        let parsed = match content_type.trim().parse::<Mime>() {
            Ok(parsed) => parsed,
            Err(_) => return FileKind::Other,
        };

        let family = parsed.type_();
        if family == mime::IMAGE {
            return FileKind::Image;
        } else if family == mime::AUDIO {
            return FileKind::Audio;
        } else if family == mime::VIDEO {
            return FileKind::Video;
        }

        match parsed.essence_str() {
            "application/pdf" => FileKind::Pdf,
            "application/vnd.ms-excel"
            | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                FileKind::Spreadsheet
            }
            "application/vnd.ms-powerpoint"
            | "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
                FileKind::Presentation
            }
            "application/zip" | "application/x-zip-compressed" => FileKind::Archive,
            "text/plain"
            | "text/csv"
            | "application/json"
            | "application/xml"
            | "application/rtf"
            | "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                FileKind::Text
            }
            _ => FileKind::Other,
        }
    }

    /// The glyph for this kind.  Images get a real preview and unknown
    /// files only show their name, so neither has a glyph.
    pub fn glyph(&self) -> Option<Glyph> {
        let (icon, color) = match self {
            FileKind::Image | FileKind::Other => return None,
            FileKind::Pdf => ("picture_as_pdf", "#f44336"),
            FileKind::Spreadsheet => ("table_view", "#388e3c"),
            FileKind::Presentation => ("slideshow", "#1976d2"),
            FileKind::Archive => ("folder_zip", "#795548"),
            FileKind::Audio => ("audio_file", "#607d8b"),
            FileKind::Video => ("play_circle", "#607d8b"),
            FileKind::Text => ("article", "#000000"),
        };
        Some(Glyph { icon, color })
    }

    pub fn has_pixel_preview(&self) -> bool {
        matches!(self, FileKind::Image)
    }
}

/// A file the user picked for upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedFile {
    path: PathBuf,
    name: String,
    content_type: String,
    size: u64,
}

impl SelectedFile {
    /// Picks the file at `path`.  The content type is guessed from the
    /// extension and left empty when unknown.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(CactusError::InvalidInput(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| CactusError::required("file name"))?;
        let content_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            name,
            content_type,
            size: metadata.len(),
        })
    }

    /// Overrides the guessed content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_mime(&self.content_type)
    }

    /// Reads the raw bytes to upload
    pub async fn read(&self) -> Result<Bytes> {
        Ok(Bytes::from(tokio::fs::read(&self.path).await?))
    }
}

/// What to show for the selected file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preview {
    pub kind: FileKind,
    /// A `file://` URL of the selected file
    pub url: String,
    pub glyph: Option<Glyph>,
    /// Caption under the preview
    pub caption: String,
}

impl Preview {
    pub fn for_file(file: &SelectedFile) -> Self {
        let kind = file.kind();
        let absolute = std::fs::canonicalize(file.path()).unwrap_or_else(|_| file.path().to_path_buf());
        Self {
            kind,
            url: format!("file://{}", absolute.display()),
            glyph: kind.glyph(),
            caption: file.name().to_string(),
        }
    }

    pub fn is_zoomable(&self) -> bool {
        self.kind.has_pixel_preview()
    }
}
