//! Line-oriented round-robin record files.
//!
//! Writers persist one record per closed window. Each metric/writer pair gets
//! its own file, laid out as a header followed by data lines:
//!
//! ```text
//! # metricsd rrd
//! step 10
//! DS:ok:GAUGE:600:0:U              <- data-source declarations
//! DS:fail:GAUGE:600:0:U
//! RRA:AVERAGE:0.5:1:25920          <- archive declarations
//! template ok:fail                 <- field order of the data lines
//! 1700000000:12:1                  <- timestamp:field1:field2:...
//! 1700000010:9:0
//! ```
//!
//! The header mirrors what an `rrdtool create` call would declare, so the
//! file can be replayed into a real round-robin database.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, WriterError};

/// First line of every file.
const MAGIC: &str = "# metricsd rrd";

const STEP_PREFIX: &str = "step ";
const TEMPLATE_PREFIX: &str = "template ";

/// Everything declared ahead of the data lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrdHeader {
    /// Seconds between consecutive data lines.
    pub step: i64,
    /// `DS:` and `RRA:` declarations, in file order.
    pub declarations: Vec<String>,
    /// Colon-separated field names of each data line.
    pub template: String,
}

/// A parsed file: its header and data lines in append order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RrdContents {
    /// The file header.
    pub header: RrdHeader,
    /// The data lines, oldest first.
    pub rows: Vec<String>,
}

/// Handle to an RRD file whose header has been written or verified.
#[derive(Debug)]
pub struct RrdFile {
    path: PathBuf,
}

impl RrdFile {
    /// Opens the file at `path`, creating it with `header` if it is new.
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::TemplateMismatch`] if an existing file declares
    /// different fields, [`WriterError::StepMismatch`] if it was created with
    /// a different step, or an I/O error if the file cannot be created or
    /// read.
    pub fn create_or_open<P: AsRef<Path>>(path: P, header: &RrdHeader) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if path.exists() {
            let existing = read_header(&path, &mut BufReader::new(open_read(&path)?))?;
            if existing.template != header.template {
                return Err(WriterError::TemplateMismatch {
                    path,
                    existing: existing.template,
                    expected: header.template.clone(),
                }
                .into());
            }
            if existing.step != header.step {
                return Err(WriterError::StepMismatch {
                    path,
                    existing: existing.step,
                    expected: header.step,
                }
                .into());
            }
            return Ok(Self { path });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| WriterError::Create {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut text = String::new();
        text.push_str(MAGIC);
        text.push('\n');
        text.push_str(&format!("{STEP_PREFIX}{}\n", header.step));
        for declaration in &header.declarations {
            text.push_str(declaration);
            text.push('\n');
        }
        text.push_str(&format!("{TEMPLATE_PREFIX}{}\n", header.template));

        fs::write(&path, text).map_err(|e| WriterError::Create {
            path: path.clone(),
            source: e,
        })?;

        Ok(Self { path })
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one data line.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::Append`] if the write fails.
    pub fn append(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| WriterError::Append {
                path: self.path.clone(),
                source: e,
            })?;

        file.write_all(format!("{line}\n").as_bytes())
            .map_err(|e| WriterError::Append {
                path: self.path.clone(),
                source: e,
            })?;

        Ok(())
    }

    /// Reads and parses a whole file.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::Corrupted`] if the header is malformed, or
    /// [`WriterError::Read`] on I/O failure.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<RrdContents> {
        let path = path.as_ref();
        let mut reader = BufReader::new(open_read(path)?);
        let header = read_header(path, &mut reader)?;

        let mut rows = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|e| WriterError::Read {
                path: path.to_path_buf(),
                source: e,
            })?;
            if !line.is_empty() {
                rows.push(line);
            }
        }

        Ok(RrdContents { header, rows })
    }
}

fn open_read(path: &Path) -> Result<File> {
    let file = File::open(path).map_err(|e| WriterError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(file)
}

/// Consumes header lines up to and including the template line.
fn read_header<R: BufRead>(path: &Path, reader: &mut R) -> Result<RrdHeader> {
    let corrupted = |reason: &str| WriterError::Corrupted {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let mut lines = Vec::new();
    let mut buf = String::new();
    loop {
        buf.clear();
        let n = reader.read_line(&mut buf).map_err(|e| WriterError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        if n == 0 {
            return Err(corrupted("missing template line").into());
        }
        let line = buf.trim_end().to_string();
        let done = line.starts_with(TEMPLATE_PREFIX);
        lines.push(line);
        if done {
            break;
        }
    }

    if lines.first().map(String::as_str) != Some(MAGIC) {
        return Err(corrupted("missing '# metricsd rrd' marker").into());
    }

    let step = lines
        .get(1)
        .and_then(|l| l.strip_prefix(STEP_PREFIX))
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| corrupted("missing or invalid step line"))?;

    let mut declarations = Vec::new();
    let mut template = String::new();
    for line in &lines[2..] {
        if let Some(t) = line.strip_prefix(TEMPLATE_PREFIX) {
            template = t.to_string();
        } else if line.starts_with("DS:") || line.starts_with("RRA:") {
            declarations.push(line.clone());
        } else {
            return Err(corrupted(&format!("unexpected header line '{line}'")).into());
        }
    }

    Ok(RrdHeader {
        step,
        declarations,
        template,
    })
}
