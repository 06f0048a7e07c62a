use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff", "svg"];

/// A file the user attached to a prompt.
///
/// Text content is read on first use so that images and unused files are
/// never loaded as text.
#[derive(Debug)]
pub struct SelectedFile {
    pub name: String,
    pub path: PathBuf,
    /// Lowercase extension without the dot, empty when absent
    pub extension: String,
    pub is_image: bool,
    /// True when content is read from `path` on demand
    pub loaded_lazily: bool,
    content: OnceLock<String>,
}

impl SelectedFile {
    /// Describes a file on disk without reading it.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let extension = extension_of(&path);
        Self {
            name,
            is_image: is_image_extension(&extension),
            extension,
            path,
            loaded_lazily: true,
            content: OnceLock::new(),
        }
    }

    /// A file whose content is already known.
    pub fn with_content(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        content: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let extension = extension_of(Path::new(&name));
        let content_cell = OnceLock::new();
        let _ = content_cell.set(content.into());
        Self {
            is_image: is_image_extension(&extension),
            extension,
            name,
            path: path.into(),
            loaded_lazily: false,
            content: content_cell,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.content.get().is_some()
    }

    /// Text content, read from disk on first call. A read failure is
    /// rendered as an inline note instead of failing the prompt.
    pub fn content(&self) -> &str {
        self.content.get_or_init(|| match std::fs::read(&self.path) {
            Ok(bytes) => {
                log::debug!("loaded {} ({} bytes)", self.path.display(), bytes.len());
                String::from_utf8_lossy(&bytes).into_owned()
            }
            Err(err) => {
                log::warn!("could not read {}: {}", self.path.display(), err);
                format!("[Could not read file: {err}]")
            }
        })
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn is_image_extension(extension: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&extension)
}
