use base64::Engine;
use std::path::Path;
use std::sync::Arc;

/// A user-selected file queued for detection.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

impl ImageUpload {
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }

    pub fn preview(&self) -> ImagePreview {
        ImagePreview {
            file_name: self.file_name.clone(),
            media_type: self.media_type.clone(),
            bytes: self.bytes.clone(),
        }
    }
}

/// Local preview of the file being analysed.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePreview {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

impl ImagePreview {
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.media_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// File name and extension-derived media type of a file on disk.
pub fn describe_path(path: &Path) -> (String, &'static str) {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".into());
    (file_name, media_type_for(path))
}

fn media_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_follows_extension() {
        let (name, media_type) = describe_path(Path::new("/tmp/lots/North.PNG"));
        assert_eq!(name, "North.PNG");
        assert_eq!(media_type, "image/png");
        assert_eq!(describe_path(Path::new("scan.tiff")).1, "image/tiff");
    }

    #[test]
    fn unknown_extension_is_not_an_image() {
        let (name, media_type) = describe_path(Path::new("dump.bin"));
        let upload = ImageUpload::new(name, media_type, b"raw".to_vec());
        assert_eq!(upload.size(), 3);
        assert!(!upload.is_image());
    }

    #[test]
    fn preview_renders_data_url() {
        let upload = ImageUpload::new("lot.jpg", "image/jpeg", b"hello".to_vec());
        assert_eq!(upload.preview().data_url(), "data:image/jpeg;base64,aGVsbG8=");
    }
}
