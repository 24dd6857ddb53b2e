//! Core image processing functionality

use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};
use tracing::{debug, warn};

use crate::config::CompressionOptions;
use crate::error::CompressionFailure;

pub mod discovery;
pub mod formats;
pub mod resize;

pub use discovery::*;
pub use formats::*;
pub use resize::*;

/// One unit of work: an input, its output, and its discovery position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageJob {
    input_path: PathBuf,
    output_path: PathBuf,
    index: usize,
}

impl ImageJob {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(index: usize, input_path: P, output_path: Q) -> Self {
        Self {
            input_path: input_path.into(),
            output_path: output_path.into(),
            index,
        }
    }

    /// Build jobs from discovery results, indexed in discovery order
    pub fn from_resolved(paths: Vec<ResolvedPath>) -> Vec<ImageJob> {
        paths
            .into_iter()
            .enumerate()
            .map(|(index, path)| Self::new(index, path.input, path.output))
            .collect()
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Position in the discovery sequence; says nothing about completion order
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Terminal result of a job, produced exactly once per job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Success {
        job_index: usize,
    },
    Failure {
        job_index: usize,
        input_path: PathBuf,
        byte_size: u64,
        cause: String,
    },
}

impl JobOutcome {
    pub fn job_index(&self) -> usize {
        match self {
            Self::Success { job_index } | Self::Failure { job_index, .. } => *job_index,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Anything that can turn a job into an outcome without unwinding
///
/// Schedulers are written against this trait so they never depend on the
/// image codecs directly.
pub trait JobRunner: Send + Sync {
    fn run(&self, job: &ImageJob) -> JobOutcome;
}

/// Decode, normalize, resize and re-encode one image
pub struct CompressionEngine {
    options: CompressionOptions,
}

impl CompressionEngine {
    pub fn new(options: CompressionOptions) -> Self {
        Self { options }
    }

    /// Compress a single job, reporting failure as a value
    pub fn compress(&self, job: &ImageJob) -> Result<(), CompressionFailure> {
        debug!("Processing file: {:?} -> {:?}", job.input_path, job.output_path);

        let image = load_image(&job.input_path)?;

        // Always normalize to 3 channels before resize/encode
        let image = DynamicImage::ImageRgb8(image.to_rgb8());
        let image = apply_resize(image, &self.options);

        let bytes = encode(&image, &self.options)?;
        save_bytes(&job.output_path, &bytes)?;

        debug!(
            "Saved {}x{} ({} bytes) to {:?}",
            image.width(),
            image.height(),
            bytes.len(),
            job.output_path
        );
        Ok(())
    }
}

impl JobRunner for CompressionEngine {
    fn run(&self, job: &ImageJob) -> JobOutcome {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.compress(job)))
            .unwrap_or_else(|payload| Err(CompressionFailure::Panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(()) => JobOutcome::Success { job_index: job.index },
            Err(failure) => {
                if failure.is_decode() {
                    debug!("Skipping unreadable input {:?}: {}", job.input_path, failure);
                } else {
                    warn!("Could not produce {:?}: {}", job.output_path, failure);
                }

                JobOutcome::Failure {
                    job_index: job.index,
                    input_path: job.input_path.clone(),
                    byte_size: fs::metadata(&job.input_path).map(|m| m.len()).unwrap_or(0),
                    cause: failure.to_string(),
                }
            }
        }
    }
}

fn load_image(path: &Path) -> Result<DynamicImage, CompressionFailure> {
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(CompressionFailure::Read)?
        .decode()
        .map_err(CompressionFailure::Decode)
}

fn save_bytes(output_path: &Path, bytes: &[u8]) -> Result<(), CompressionFailure> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(CompressionFailure::Write)?;
    }
    fs::write(output_path, bytes).map_err(CompressionFailure::Write)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use image::RgbaImage;
    use tempfile::TempDir;

    fn engine(resize: bool, format: OutputFormat) -> CompressionEngine {
        CompressionEngine::new(CompressionOptions::new(80, resize, 800, format).unwrap())
    }

    #[test]
    fn test_compress_resizes_and_writes() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("wide.png");
        RgbaImage::new(1600, 900).save(&input).unwrap();

        let output = dir.path().join("out/nested/wide.jpeg");
        let job = ImageJob::new(0, &input, &output);

        let outcome = engine(true, OutputFormat::Jpeg).run(&job);
        assert_eq!(outcome, JobOutcome::Success { job_index: 0 });

        let written = image::open(&output).unwrap();
        assert_eq!((written.width(), written.height()), (800, 450));
    }

    #[test]
    fn test_corrupt_input_is_failure() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("corrupt.jpg");
        std::fs::write(&input, b"not_an_image").unwrap();
        let output = dir.path().join("out/corrupt.jpeg");

        let outcome = engine(false, OutputFormat::Jpeg).run(&ImageJob::new(3, &input, &output));

        match outcome {
            JobOutcome::Failure {
                job_index,
                byte_size,
                input_path,
                ..
            } => {
                assert_eq!(job_index, 3);
                assert_eq!(byte_size, 12);
                assert_eq!(input_path, input);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(!output.exists());
    }

    #[test]
    fn test_unwritable_output_is_failure() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("fine.png");
        RgbaImage::new(40, 30).save(&input).unwrap();
        let input_size = std::fs::metadata(&input).unwrap().len();

        // a regular file where the output directory should be
        let blocker = dir.path().join("out");
        std::fs::write(&blocker, b"in the way").unwrap();
        let job = ImageJob::new(5, &input, blocker.join("fine.jpeg"));

        let engine = engine(false, OutputFormat::Jpeg);
        assert!(matches!(engine.compress(&job), Err(CompressionFailure::Write(_))));

        match engine.run(&job) {
            JobOutcome::Failure {
                job_index,
                byte_size,
                cause,
                ..
            } => {
                assert_eq!(job_index, 5);
                assert_eq!(byte_size, input_size);
                assert!(cause.starts_with("cannot write output"), "cause: {}", cause);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(std::fs::read(&blocker).unwrap(), b"in the way");
    }

    #[test]
    fn test_missing_input_has_zero_size() {
        let dir = TempDir::new().unwrap();
        let job = ImageJob::new(1, dir.path().join("gone.png"), dir.path().join("gone.png.out"));

        let outcome = engine(false, OutputFormat::Png).run(&job);
        assert!(matches!(outcome, JobOutcome::Failure { byte_size: 0, .. }));
    }

    #[test]
    fn test_jobs_indexed_in_discovery_order() {
        let jobs = ImageJob::from_resolved(vec![
            ResolvedPath {
                input: "a.png".into(),
                output: "out/a.jpeg".into(),
            },
            ResolvedPath {
                input: "b.png".into(),
                output: "out/b.jpeg".into(),
            },
        ]);

        assert_eq!(jobs[0].index(), 0);
        assert_eq!(jobs[1].index(), 1);
        assert_eq!(jobs[1].input_path(), Path::new("b.png"));
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
