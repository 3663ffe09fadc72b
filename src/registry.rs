//! Identity registry.
//!
//! Built once at startup from reference images and never mutated afterwards.
//! Insertion order is match priority: when a face is within tolerance of several
//! identities, the earliest registered one wins.

use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::IdentitySettings;
use crate::detect::{Embedding, FaceBackend};
use crate::error::FacelinkError;
use crate::frame::Frame;

/// A known person and the embedding of their reference face.
#[derive(Clone, Debug, PartialEq)]
pub struct Identity {
    pub name: String,
    pub embedding: Embedding,
}

/// Name and reference image for one identity to be registered.
#[derive(Clone, Debug)]
pub struct IdentitySource {
    pub name: String,
    pub image: PathBuf,
}

impl IdentitySource {
    pub fn new(name: impl Into<String>, image: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
        }
    }
}

impl From<&IdentitySettings> for IdentitySource {
    fn from(settings: &IdentitySettings) -> Self {
        Self::new(settings.name.clone(), settings.image.clone())
    }
}

/// Ordered set of known identities with unique names.
#[derive(Clone, Debug, Default)]
pub struct KnownSet {
    names: Vec<String>,
    embeddings: Vec<Embedding>,
}

impl KnownSet {
    pub fn new(identities: Vec<Identity>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut names = Vec::with_capacity(identities.len());
        let mut embeddings = Vec::with_capacity(identities.len());
        for identity in identities {
            if !seen.insert(identity.name.clone()) {
                return Err(FacelinkError::Config(format!(
                    "duplicate identity name '{}'",
                    identity.name
                ))
                .into());
            }
            names.push(identity.name);
            embeddings.push(identity.embedding);
        }
        Ok(Self { names, embeddings })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn embeddings(&self) -> &[Embedding] {
        &self.embeddings
    }

    /// Name of the earliest identity flagged in `matches`.
    pub fn first_match(&self, matches: &[bool]) -> Option<&str> {
        matches
            .iter()
            .position(|&matched| matched)
            .and_then(|index| self.names.get(index))
            .map(String::as_str)
    }
}

/// Read a reference image from disk as an RGB frame.
pub fn load_reference_image(path: &Path) -> Result<Frame> {
    let image = image::open(path).map_err(|e| FacelinkError::ImageLoad {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(Frame::from_rgb_image(image.to_rgb8()))
}

/// Build the known set from reference images.
///
/// Each image must show exactly one face. When the detector returns several,
/// the first one in detector order is kept; which face that is depends on the
/// backend. Any failure aborts the whole load, so no partial set is returned.
pub fn load(sources: &[IdentitySource], backend: &mut dyn FaceBackend) -> Result<KnownSet> {
    let mut identities = Vec::with_capacity(sources.len());
    for source in sources {
        let image = load_reference_image(&source.image)?;
        let locations = backend
            .locate_faces(&image)
            .map_err(|e| encoding_error(&source.name, e.to_string()))?;
        let Some(first) = locations.first() else {
            return Err(encoding_error(
                &source.name,
                format!("no face found in {}", source.image.display()),
            ));
        };
        if locations.len() > 1 {
            log::warn!(
                "reference image {} contains {} faces; using the first one reported",
                source.image.display(),
                locations.len()
            );
        }
        let embedding = backend
            .embed(&image, first)
            .map_err(|e| encoding_error(&source.name, e.to_string()))?;
        log::info!(
            "registered identity '{}' from {}",
            source.name,
            source.image.display()
        );
        identities.push(Identity {
            name: source.name.clone(),
            embedding,
        });
    }
    KnownSet::new(identities)
}

fn encoding_error(identity: &str, message: String) -> anyhow::Error {
    FacelinkError::Encoding {
        identity: identity.to_string(),
        message,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::StubBackend;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_image(dir: &TempDir, name: &str, rgb: [u8; 3]) -> PathBuf {
        let path = dir.path().join(format!("{name}.png"));
        RgbImage::from_pixel(16, 16, Rgb(rgb))
            .save(&path)
            .expect("write fixture");
        path
    }

    #[test]
    fn loads_in_insertion_order() -> Result<()> {
        let dir = TempDir::new()?;
        let sources = vec![
            IdentitySource::new("A", write_image(&dir, "a", [200, 0, 0])),
            IdentitySource::new("B", write_image(&dir, "b", [0, 200, 0])),
        ];
        let known = load(&sources, &mut StubBackend::new())?;
        assert_eq!(known.names(), &["A".to_string(), "B".to_string()]);
        assert_eq!(known.embeddings()[1].values(), &[0.0, 200.0 / 64.0, 0.0]);
        Ok(())
    }

    #[test]
    fn faceless_image_is_an_encoding_error() -> Result<()> {
        let dir = TempDir::new()?;
        let sources = vec![
            IdentitySource::new("A", write_image(&dir, "a", [200, 0, 0])),
            IdentitySource::new("Blank", write_image(&dir, "blank", [0, 0, 0])),
        ];
        let err = load(&sources, &mut StubBackend::new()).unwrap_err();
        let kind = FacelinkError::classify(&err).expect("classified");
        assert_eq!(kind.code(), "ENCODING");
        assert!(kind.is_fatal());
        Ok(())
    }

    #[test]
    fn missing_image_is_an_image_load_error() {
        let sources = vec![IdentitySource::new("Ghost", "/nonexistent/ghost.jpeg")];
        let err = load(&sources, &mut StubBackend::new()).unwrap_err();
        assert_eq!(
            FacelinkError::classify(&err).map(|k| k.code()),
            Some("IMAGE_LOAD")
        );
    }

    #[test]
    fn first_match_prefers_earliest() -> Result<()> {
        let known = KnownSet::new(vec![
            Identity {
                name: "A".into(),
                embedding: Embedding::new(vec![0.0]),
            },
            Identity {
                name: "B".into(),
                embedding: Embedding::new(vec![0.0]),
            },
        ])?;
        assert_eq!(known.first_match(&[true, true]), Some("A"));
        assert_eq!(known.first_match(&[false, true]), Some("B"));
        assert_eq!(known.first_match(&[false, false]), None);
        Ok(())
    }

    #[test]
    fn rejects_duplicate_names() {
        let identity = Identity {
            name: "A".into(),
            embedding: Embedding::new(vec![0.0]),
        };
        assert!(KnownSet::new(vec![identity.clone(), identity]).is_err());
    }
}
