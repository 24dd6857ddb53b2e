//! Input discovery and output path resolution

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{BatchError, Result};
use crate::processing::formats::is_supported_input_path;

/// One discovered input and the path its output will be written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Turns an input tree into an ordered list of input/output pairs
#[derive(Debug, Clone)]
pub struct PathResolver {
    input_root: PathBuf,
    output_root: PathBuf,
    recursive: bool,
    flatten: bool,
    output_extension: String,
}

impl PathResolver {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(
        input_root: P,
        output_root: Q,
        output_extension: &str,
    ) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            recursive: false,
            flatten: false,
            output_extension: output_extension.to_string(),
        }
    }

    /// Walk the full subtree instead of direct children only
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Drop the input directory structure from output paths
    pub fn flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    /// Enumerate supported inputs in filesystem order
    ///
    /// The order is whatever the directory walk yields; callers assign job
    /// indices from it. An empty result is not an error.
    pub fn discover(&self) -> Result<Vec<ResolvedPath>> {
        if !self.input_root.is_dir() {
            return Err(BatchError::input_not_found(&self.input_root));
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let mut resolved = Vec::new();

        let walker = WalkDir::new(&self.input_root)
            .follow_links(true)
            .min_depth(1)
            .max_depth(max_depth);

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            // symlinks are resolved, so a linked image reports as a file
            if !entry.file_type().is_file() || !is_supported_input_path(entry.path()) {
                continue;
            }

            let output = self.output_path_for(entry.path());
            resolved.push(ResolvedPath {
                input: entry.into_path(),
                output,
            });
        }

        if self.flatten {
            warn_on_collisions(&resolved);
        }

        debug!(
            "Discovered {} images under {:?}",
            resolved.len(),
            self.input_root
        );
        Ok(resolved)
    }

    /// Compute the output path for a single input
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let mut file_name: OsString = input.file_stem().unwrap_or_default().to_os_string();
        file_name.push(".");
        file_name.push(&self.output_extension);

        let relative_dir = input
            .strip_prefix(&self.input_root)
            .ok()
            .and_then(Path::parent)
            .filter(|dir| self.recursive && !self.flatten && !dir.as_os_str().is_empty());

        match relative_dir {
            Some(dir) => self.output_root.join(dir).join(file_name),
            None => self.output_root.join(file_name),
        }
    }
}

/// Flattened outputs can collide; the later write wins. Flag it loudly.
fn warn_on_collisions(resolved: &[ResolvedPath]) {
    let mut sources: HashMap<&Path, Vec<&Path>> = HashMap::new();
    for path in resolved {
        sources
            .entry(path.output.as_path())
            .or_default()
            .push(path.input.as_path());
    }

    for (output, inputs) in sources.into_iter().filter(|(_, inputs)| inputs.len() > 1) {
        warn!(
            "{} inputs map to {:?} in flattened mode; the last one written wins: {:?}",
            inputs.len(),
            output,
            inputs
        );
    }
}
