//! Specification sources and the raw input handed to the parsers

use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Where a specification load starts from
#[derive(Debug, Clone)]
pub enum SpecSource {
    /// Remote document fetched with a GET request
    Url(String),

    /// File contents supplied by the caller (e.g. a browser upload)
    Upload { file_name: String, text: String },

    /// File on the local filesystem
    Path(PathBuf),
}

impl SpecSource {
    /// Interpret a command-line argument as a URL or a path
    pub fn from_arg(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            SpecSource::Url(arg.to_string())
        } else {
            SpecSource::Path(PathBuf::from(arg))
        }
    }

    pub fn upload(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        SpecSource::Upload {
            file_name: file_name.into(),
            text: text.into(),
        }
    }
}

impl fmt::Display for SpecSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecSource::Url(url) => write!(f, "{}", url),
            SpecSource::Upload { file_name, .. } => write!(f, "upload {}", file_name),
            SpecSource::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Origin of a raw specification text
#[derive(Debug, Clone, PartialEq)]
pub enum SpecOrigin {
    Url(Url),
    File {
        name: String,
        /// Present when the file lives on disk, used as the base for external refs
        path: Option<PathBuf>,
    },
}

impl SpecOrigin {
    /// Display name shown to users
    ///
    /// URLs use their last non-empty path segment, falling back to the host and
    /// then the whole URL. Files use their name.
    pub fn display_name(&self) -> String {
        match self {
            SpecOrigin::Url(url) => url
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(|s| s.to_string())
                .or_else(|| url.host_str().map(|h| h.to_string()))
                .unwrap_or_else(|| url.to_string()),
            SpecOrigin::File { name, .. } => name.clone(),
        }
    }

    /// Location that relative external references resolve against
    pub fn base_url(&self) -> Option<Url> {
        match self {
            SpecOrigin::Url(url) => Some(url.clone()),
            SpecOrigin::File { path: Some(path), .. } => file_url(path),
            SpecOrigin::File { path: None, .. } => None,
        }
    }

    /// Extension that decides which parser is tried first
    pub fn extension_hint(&self) -> Option<String> {
        let name = match self {
            SpecOrigin::Url(url) => url.path().to_string(),
            SpecOrigin::File { name, .. } => name.clone(),
        };
        Path::new(&name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

impl fmt::Display for SpecOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecOrigin::Url(url) => write!(f, "{}", url),
            SpecOrigin::File { path: Some(path), .. } => write!(f, "{}", path.display()),
            SpecOrigin::File { name, .. } => write!(f, "{}", name),
        }
    }
}

/// Unparsed text of a candidate specification
#[derive(Debug, Clone)]
pub struct RawSpecInput {
    pub text: String,
    pub origin: SpecOrigin,
    /// Declared content type, advisory only
    pub content_type: Option<String>,
}

impl RawSpecInput {
    pub fn from_upload(file_name: &str, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin: SpecOrigin::File {
                name: file_name.to_string(),
                path: None,
            },
            content_type: None,
        }
    }

    /// Parser preference
    ///
    /// Files named `.yaml`/`.yml` try YAML first and every other file, with or
    /// without an extension, tries JSON first. URLs follow the advisory
    /// content type and default to YAML.
    pub fn format_hint(&self) -> Option<String> {
        match &self.origin {
            SpecOrigin::File { .. } => match self.origin.extension_hint().as_deref() {
                Some("yaml" | "yml") => Some("yaml".to_string()),
                _ => Some("json".to_string()),
            },
            SpecOrigin::Url(_) => {
                let declared_json = self
                    .content_type
                    .as_deref()
                    .map(|ct| ct.to_ascii_lowercase().contains("json"))
                    .unwrap_or(false);
                if declared_json {
                    Some("json".to_string())
                } else {
                    Some("yaml".to_string())
                }
            }
        }
    }
}

fn file_url(path: &Path) -> Option<Url> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    Url::from_file_path(absolute).ok()
}
