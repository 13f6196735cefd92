//! The per-file transform boundary.
//!
//! A [`TransformInvoker`] turns one [`Job`] into one [`ResultRecord`]. It runs
//! on a worker thread and may take as long as it likes. Returning `Err` means
//! the invoker itself is unusable and the batch has to stop; an individual
//! file that fails to clean is reported as a crashed record instead.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use log::{debug, warn};
use quick_xml::events::Event;
use quick_xml::Reader;

use svgbatch_common::{Job, ResultRecord};

use crate::error::InvokerError;

pub trait TransformInvoker: Send + Sync {
    fn invoke(&self, job: &Job) -> Result<ResultRecord, InvokerError>;
}

impl<F> TransformInvoker for F
where
    F: Fn(&Job) -> Result<ResultRecord, InvokerError> + Send + Sync,
{
    fn invoke(&self, job: &Job) -> Result<ResultRecord, InvokerError> {
        self(job)
    }
}

/// Runs an external cleaner as `program args... <input> <output>` once per job.
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandInvoker {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl TransformInvoker for CommandInvoker {
    fn invoke(&self, job: &Job) -> Result<ResultRecord, InvokerError> {
        let input_bytes = match fs::metadata(&job.input) {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!("[invoker] cannot stat {:?}: {}", job.input, e);
                return Ok(ResultRecord::crashed(job, 0));
            }
        };

        if let Some(parent) = job.output.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("[invoker] cannot create {:?}: {}", parent, e);
                return Ok(ResultRecord::crashed(job, input_bytes));
            }
        }

        let started = Instant::now();
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&job.input)
            .arg(&job.output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let status = match status {
            Ok(status) => status,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                return Err(InvokerError::Unusable(format!(
                    "cleaner {:?} could not be started: {}",
                    self.program, e
                )));
            }
            Err(e) => return Err(InvokerError::Io(e)),
        };

        if !status.success() {
            debug!("[invoker] {:?} exited with {}", job.input, status);
            return Ok(ResultRecord::crashed(job, input_bytes));
        }

        let output = match fs::read(&job.output) {
            Ok(data) => data,
            Err(e) => {
                debug!("[invoker] no output for {:?}: {}", job.input, e);
                return Ok(ResultRecord::crashed(job, input_bytes));
            }
        };

        let (attrs, elems) = if is_gzip(&output) {
            (0, 0)
        } else {
            markup_counts(&output)
        };

        Ok(ResultRecord::cleaned(job, input_bytes, output.len() as u64, elapsed_ms)
            .with_counts(attrs, elems))
    }
}

fn is_gzip(data: &[u8]) -> bool {
    data.starts_with(&[0x1f, 0x8b])
}

/// Counts `(attributes, elements)` in a markup document.
///
/// Every start or empty tag is one element. Text, CDATA, comments and
/// declarations are not counted. Parsing stops at the first malformed tag
/// and returns what was counted up to there.
pub fn markup_counts(data: &[u8]) -> (u64, u64) {
    let mut reader = Reader::from_reader(data);
    reader.config_mut().check_end_names = false;

    let mut attrs = 0;
    let mut elems = 0;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                // `<` followed by whitespace is stray text, not a tag
                if e.name().as_ref().is_empty() {
                    continue;
                }
                elems += 1;
                attrs += e.attributes().filter(Result::is_ok).count() as u64;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!(
                    "[invoker] markup scan stopped at byte {}: {}",
                    reader.buffer_position(),
                    e
                );
                break;
            }
            _ => {}
        }
    }
    (attrs, elems)
}
