//! Input validation utilities
//!
//! Common validation and parsing functions for command-line parameters and input files,
//! with errors from [`crate::errors`].

use std::fmt::Display;
use std::io::BufRead;
use std::path::Path;

use fgoxide::io::Io;

use crate::errors::{ClonekitError, Result};

/// Validate that a file exists
///
/// # Example
/// ```
/// use clonekit_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/file.alns", "Input file");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(ClonekitError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate that multiple files exist, failing on the first missing one
pub fn validate_files_exist<P: AsRef<Path>>(files: &[P], description: &str) -> Result<()> {
    for path in files {
        validate_file_exists(path, description)?;
    }
    Ok(())
}

/// Validate that a value is positive (> 0)
///
/// # Example
/// ```
/// use clonekit_lib::validation::validate_positive;
///
/// validate_positive(10, "threads").unwrap();
/// assert!(validate_positive(0, "threads").is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_positive<T: Ord + Display + Default>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(ClonekitError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be positive (> 0), got: {value}"),
        });
    }
    Ok(())
}

/// Validate that an output path does not also appear among the inputs
pub fn validate_output_not_input<P: AsRef<Path>>(output: &Path, inputs: &[P]) -> Result<()> {
    if inputs.iter().any(|i| i.as_ref() == output) {
        return Err(ClonekitError::InvalidParameter {
            parameter: "output".to_string(),
            reason: format!("{} is also an input", output.display()),
        });
    }
    Ok(())
}

/// Parse a memory size such as `512M`, `2G`, `64K` or a plain byte count.
///
/// Returns a `String` error so it can be used as a clap `value_parser`.
///
/// # Example
/// ```
/// use clonekit_lib::validation::parse_memory;
///
/// assert_eq!(parse_memory("2G").unwrap(), 2 * 1024 * 1024 * 1024);
/// assert_eq!(parse_memory("1.5k").unwrap(), 1536);
/// assert!(parse_memory("lots").is_err());
/// ```
pub fn parse_memory(s: &str) -> std::result::Result<usize, String> {
    let s = s.trim().to_uppercase();
    if s.is_empty() {
        return Err("Empty memory specification".to_string());
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('G') {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('K') {
        (n, 1024)
    } else {
        (s.as_str(), 1)
    };

    let num: f64 = num_str.parse().map_err(|_| format!("Invalid number: {num_str}"))?;
    if num < 0.0 {
        return Err("Memory size must be positive".to_string());
    }
    Ok((num * f64::from(multiplier)) as usize)
}

/// Read a newline-delimited list of integer ids; blank lines and `#` comments are skipped.
pub fn read_id_file(path: &Path) -> anyhow::Result<Vec<u64>> {
    validate_file_exists(path, "Id list")?;
    let reader = Io::default().new_reader(path)?;
    let mut ids = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let id = trimmed.parse::<u64>().map_err(|_| ClonekitError::InvalidFileFormat {
            file_type: "Id list".to_string(),
            path: path.display().to_string(),
            reason: format!("line {} is not a non-negative integer: '{trimmed}'", number + 1),
        })?;
        ids.push(id);
    }
    Ok(ids)
}

/// Ids given inline followed by the ids of `file`, in order; at least one id is required.
pub fn resolve_id_list(inline: &[u64], file: Option<&Path>) -> anyhow::Result<Vec<u64>> {
    let mut ids = inline.to_vec();
    if let Some(path) = file {
        ids.extend(read_id_file(path)?);
    }
    if ids.is_empty() {
        return Err(ClonekitError::InvalidParameter {
            parameter: "ids".to_string(),
            reason: "no ids given; use --id or --id-file".to_string(),
        }
        .into());
    }
    Ok(ids)
}
