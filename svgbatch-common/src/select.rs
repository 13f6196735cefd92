use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

use crate::job::Job;

/// Filändelser som räknas som SVG-indata.
const SVG_EXTENSIONS: &[&str] = &["svg", "svgz"];

/// Returns `true` if the file extension marks an SVG or gzipped SVG.
pub fn is_svg_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SVG_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Walks `input_dir` for SVG files and mirrors each one under `output_dir`.
///
/// Jobs come back sorted by input path so a batch is reproducible.
pub fn plan_jobs(input_dir: &Path, output_dir: &Path) -> Result<Vec<Job>> {
    if !input_dir.is_dir() {
        bail!("input {:?} is not a directory", input_dir);
    }

    let mut inputs: Vec<PathBuf> = WalkDir::new(input_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_svg_path(e.path()))
        .map(|e| e.path().to_path_buf())
        .collect();
    inputs.sort();

    let mut jobs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let relative = input
            .strip_prefix(input_dir)
            .with_context(|| format!("{:?} is outside {:?}", input, input_dir))?;
        let output = output_dir.join(relative);
        jobs.push(Job { input, output });
    }
    log::debug!("[planner] {} jobs from {:?}", jobs.len(), input_dir);
    Ok(jobs)
}
