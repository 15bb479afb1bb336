//! Artifact publication.
//!
//! The pipeline publishes each intermediate artifact through the
//! [`ArtifactSink`] trait instead of talking to a display or the filesystem
//! directly. The shipped implementations write files or discard everything;
//! an interactive viewer can be supplied by implementing the trait.

use std::fs;
use std::path::PathBuf;

use image::DynamicImage;
use log::debug;

use crate::error::{SegmentationError, SegmentationResult};

/// The intermediate artifacts produced by one segmentation run, in
/// publication order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// The input image after the deterministic resize.
    Resized,
    /// The input with non-cluster pixels blacked out by the rough mask.
    RoughForeground,
    /// The normalized 8-bit rendering of the probability map.
    ProbabilityMap,
    /// The input with non-cluster pixels blacked out by the refined mask.
    RefinedForeground,
}

impl Artifact {
    /// File name used when the artifact is persisted.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Resized => "resized.png",
            Self::RoughForeground => "rough_foreground.png",
            Self::ProbabilityMap => "probability_map.png",
            Self::RefinedForeground => "refined_foreground.png",
        }
    }
}

/// Receiver for pipeline artifacts.
///
/// `publish` is called once per [`Artifact`] in order; `finish` is called
/// once after the last artifact and is the place to block or flush if the
/// implementation needs to.
pub trait ArtifactSink {
    /// Accept one artifact.
    fn publish(&mut self, artifact: Artifact, image: &DynamicImage) -> SegmentationResult<()>;

    /// Called after the last artifact of a run.
    fn finish(&mut self) -> SegmentationResult<()> {
        Ok(())
    }
}

/// Sink that writes every artifact as a PNG into one directory.
#[derive(Debug)]
pub struct DirectorySink {
    directory: PathBuf,
    mask_only: bool,
}

impl DirectorySink {
    /// Create the output directory (and parents) and a sink writing into it.
    pub fn new(directory: impl Into<PathBuf>) -> SegmentationResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|source| SegmentationError::OutputDirectory {
            path: directory.clone(),
            source,
        })?;
        Ok(Self {
            directory,
            mask_only: false,
        })
    }

    /// Restrict output to the refined foreground only.
    pub fn with_mask_only(mut self, mask_only: bool) -> Self {
        self.mask_only = mask_only;
        self
    }
}

impl ArtifactSink for DirectorySink {
    fn publish(&mut self, artifact: Artifact, image: &DynamicImage) -> SegmentationResult<()> {
        if self.mask_only && artifact != Artifact::RefinedForeground {
            return Ok(());
        }
        let path = self.directory.join(artifact.file_name());
        image
            .save(&path)
            .map_err(|source| SegmentationError::ImageSave {
                path: path.clone(),
                source,
            })?;
        debug!("wrote artifact {}", path.display());
        Ok(())
    }
}

/// Sink that discards every artifact; useful when only the returned
/// [`Segmentation`](crate::pipeline::Segmentation) value is wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ArtifactSink for NullSink {
    fn publish(&mut self, _artifact: Artifact, _image: &DynamicImage) -> SegmentationResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_file_names_are_distinct() {
        let artifacts = [
            Artifact::Resized,
            Artifact::RoughForeground,
            Artifact::ProbabilityMap,
            Artifact::RefinedForeground,
        ];
        for (i, a) in artifacts.iter().enumerate() {
            for b in &artifacts[i + 1..] {
                assert_ne!(a.file_name(), b.file_name());
            }
        }
    }

    #[test]
    fn test_directory_sink_writes_artifacts() {
        let directory =
            std::env::temp_dir().join(format!("colorseg-sink-test-{}", std::process::id()));
        let mut sink = DirectorySink::new(&directory)
            .expect("temp directory is writable")
            .with_mask_only(true);

        let image = DynamicImage::new_rgb8(2, 2);
        sink.publish(Artifact::Resized, &image).expect("publish");
        sink.publish(Artifact::RefinedForeground, &image)
            .expect("publish");
        sink.finish().expect("finish");

        assert!(
            !directory.join(Artifact::Resized.file_name()).exists(),
            "mask_only must skip intermediate artifacts"
        );
        assert!(directory
            .join(Artifact::RefinedForeground.file_name())
            .exists());

        fs::remove_dir_all(&directory).expect("cleanup");
    }

    #[test]
    fn test_null_sink_accepts_everything() {
        let mut sink = NullSink;
        let image = DynamicImage::new_rgb8(1, 1);
        sink.publish(Artifact::Resized, &image).expect("null sink never fails");
        sink.finish().expect("null sink never fails");
    }
}
