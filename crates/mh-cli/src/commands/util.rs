//! Shared utilities for CLI commands.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Parses a JSON request from `input`, or from `stdin` when no file is given.
pub fn read_request<T, R>(input: Option<&Path>, stdin: R) -> Result<T>
where
    T: DeserializeOwned,
    R: Read,
{
    match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("invalid request in {}", path.display()))
        }
        None => serde_json::from_reader(stdin).context("invalid request on stdin"),
    }
}

/// Writes `value` as pretty JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, value).context("failed to write response")?;
    writeln!(writer)?;
    Ok(())
}
