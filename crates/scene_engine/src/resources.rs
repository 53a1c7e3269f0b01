use std::collections::HashMap;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};

use image::{ColorType, ImageDecoder, ImageReader};
use thiserror::Error;

use crate::scene::{PixelFormat, SceneId};

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource {name} not found")]
    Missing { name: String },
    #[error("failed to read resource {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("resource {name} is not valid UTF-8")]
    NotText { name: String },
    #[error("failed to decode image {name}: {source}")]
    Image {
        name: String,
        #[source]
        source: image::ImageError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Read access to named project resources. Names are `/`-separated and
/// relative to the project data root.
pub trait ResourceProvider {
    fn read_bytes(&self, name: &str) -> Result<Vec<u8>, ResourceError>;

    fn read_text(&self, name: &str) -> Result<String, ResourceError> {
        String::from_utf8(self.read_bytes(name)?).map_err(|_| ResourceError::NotText {
            name: name.to_string(),
        })
    }

    fn probe_image(&self, name: &str) -> Result<ImageInfo, ResourceError> {
        probe_image_bytes(name, &self.read_bytes(name)?)
    }
}

pub fn picture_resource(scene_id: SceneId, picture_id: i32) -> String {
    format!("{:08}/{:08}.png", scene_id.0, picture_id)
}

pub fn animated_prefix(scene_id: SceneId, object_id: i32) -> String {
    format!("{:08}/{:08}/", scene_id.0, object_id)
}

pub fn statics_resource(prefix: &str, statics_id: i32) -> String {
    format!("{prefix}{statics_id:08}.png")
}

pub fn phase_resource(prefix: &str, movement_id: i32, phase: usize) -> String {
    format!("{prefix}{movement_id:08}/{movement_id:08}_{phase:03}.png")
}

/// Document an adopted scene reloads from.
pub fn scene_document_resource(scene_id: SceneId) -> String {
    format!("sc{:08}.xml", scene_id.0)
}

pub fn tile_resource(scene_id: SceneId, index: usize) -> String {
    format!("{:08}/back{:03}.png", scene_id.0, index)
}

/// Maps decoded color layouts onto the bitmap tags the compositor expects.
fn pixel_format_for(color: ColorType) -> PixelFormat {
    match color {
        ColorType::Rgba8 | ColorType::Rgba16 => PixelFormat::ARGB8888,
        ColorType::Rgb8 | ColorType::Rgb16 => PixelFormat::RGB888,
        ColorType::La8 | ColorType::La16 => PixelFormat::ARGB8008,
        _ => PixelFormat::RGB565,
    }
}

fn probe_image_bytes(name: &str, bytes: &[u8]) -> Result<ImageInfo, ResourceError> {
    let to_image_error = |source: image::ImageError| ResourceError::Image {
        name: name.to_string(),
        source,
    };
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|source| ResourceError::Io {
            path: PathBuf::from(name),
            source,
        })?;
    let decoder = reader.into_decoder().map_err(to_image_error)?;
    let (width, height) = decoder.dimensions();
    Ok(ImageInfo {
        width,
        height,
        format: pixel_format_for(decoder.color_type()),
    })
}

/// Resources laid out under a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> PathBuf {
        name.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }
}

impl ResourceProvider for DirectoryResources {
    fn read_bytes(&self, name: &str) -> Result<Vec<u8>, ResourceError> {
        let path = self.resolve(name);
        fs::read(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ResourceError::Missing {
                    name: name.to_string(),
                }
            } else {
                ResourceError::Io { path, source }
            }
        })
    }
}

/// In-memory resources. Images can be registered by their dimensions alone.
#[derive(Debug, Clone, Default)]
pub struct MemoryResources {
    files: HashMap<String, Vec<u8>>,
    images: HashMap<String, ImageInfo>,
}

impl MemoryResources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_bytes(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(name.into(), bytes);
    }

    pub fn insert_text(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.files.insert(name.into(), text.into().into_bytes());
    }

    pub fn insert_image(&mut self, name: impl Into<String>, info: ImageInfo) {
        self.images.insert(name.into(), info);
    }
}

impl ResourceProvider for MemoryResources {
    fn read_bytes(&self, name: &str) -> Result<Vec<u8>, ResourceError> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| ResourceError::Missing {
                name: name.to_string(),
            })
    }

    fn probe_image(&self, name: &str) -> Result<ImageInfo, ResourceError> {
        match self.images.get(name) {
            Some(info) => Ok(*info),
            None => probe_image_bytes(name, &self.read_bytes(name)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, RgbImage, RgbaImage};
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn directory_probe_maps_color_layout_to_pixel_format() {
        let temp = TempDir::new().expect("temp");
        let dir = temp.path().join("00000301");
        fs::create_dir_all(&dir).expect("mkdir");
        RgbaImage::new(4, 2)
            .save(dir.join("back000.png"))
            .expect("save rgba");
        RgbImage::new(3, 3)
            .save(dir.join("back001.png"))
            .expect("save rgb");
        GrayImage::new(1, 1)
            .save(dir.join("back002.png"))
            .expect("save gray");

        let resources = DirectoryResources::new(temp.path());
        let rgba = resources
            .probe_image(&tile_resource(SceneId(301), 0))
            .expect("rgba");
        assert_eq!((rgba.width, rgba.height), (4, 2));
        assert_eq!(rgba.format, PixelFormat::ARGB8888);
        let rgb = resources
            .probe_image(&tile_resource(SceneId(301), 1))
            .expect("rgb");
        assert_eq!(rgb.format, PixelFormat::RGB888);
        let gray = resources
            .probe_image(&tile_resource(SceneId(301), 2))
            .expect("gray");
        assert_eq!(gray.format, PixelFormat::RGB565);
    }

    #[test]
    fn missing_file_is_reported_by_name() {
        let temp = TempDir::new().expect("temp");
        let resources = DirectoryResources::new(temp.path());
        let err = resources.read_text("nope.xml").expect_err("missing");
        assert!(matches!(err, ResourceError::Missing { name } if name == "nope.xml"));
    }

    #[test]
    fn memory_images_do_not_need_bytes() {
        let mut resources = MemoryResources::new();
        let info = ImageInfo {
            width: 10,
            height: 20,
            format: PixelFormat::RGB565,
        };
        resources.insert_image("a.png", info);
        assert_eq!(resources.probe_image("a.png").expect("probe"), info);
        assert!(resources.read_bytes("a.png").is_err());
    }

    #[test]
    fn resource_names_are_zero_padded() {
        let prefix = animated_prefix(SceneId(301), 50);
        assert_eq!(prefix, "00000301/00000050/");
        assert_eq!(statics_resource(&prefix, 7), "00000301/00000050/00000007.png");
        assert_eq!(
            phase_resource(&prefix, 600, 2),
            "00000301/00000050/00000600/00000600_002.png"
        );
        assert_eq!(picture_resource(SceneId(1), 11), "00000001/00000011.png");
    }
}
