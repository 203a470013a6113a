use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{} is {size} bytes, the limit is {limit} bytes", path.display())]
    TooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("reading {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A local file captured as an embedded `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAttachment {
    pub file_name: String,
    pub mime: &'static str,
    pub size: u64,
    pub data_url: String,
}

/// Reads `path` into a data URL. With a `limit`, oversized files are refused
/// before their contents are read.
pub fn load_media(path: &Path, limit: Option<u64>) -> Result<MediaAttachment, MediaError> {
    let io_err = |source| MediaError::Io {
        path: path.to_path_buf(),
        source,
    };
    let size = fs::metadata(path).map_err(io_err)?.len();
    if let Some(limit) = limit {
        if size > limit {
            return Err(MediaError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit,
            });
        }
    }
    let bytes = fs::read(path).map_err(io_err)?;
    let mime = guess_mime(path);
    Ok(MediaAttachment {
        file_name: path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
        mime,
        size,
        data_url: to_data_url(&bytes, mime),
    })
}

pub fn to_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}
