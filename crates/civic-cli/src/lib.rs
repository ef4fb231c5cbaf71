//! # civic-cli: operator tool for portal field encryption
//!
//! ## Subcommands
//!
//! - `civic self-test`: authenticate and round-trip a probe value.
//! - `civic health`: print the encryption health report; exit 2 when the
//!   HSM is unreachable.
//! - `civic encode --kind <k> <file>`: entity views to storage records.
//! - `civic decode --kind <k> <file>`: storage records to entity views.
//! - `civic analytics --kind <k> <file>`: counts over storage records,
//!   without the HSM.
//!
//! HSM settings come from the same `FORTANIX_*` variables as the API.
//! Record files hold one JSON object or an array of them; results go to
//! stdout as JSON.

pub mod health;
pub mod records;

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use civic_fields::Record;
use serde::Serialize;
use serde_json::Value;

/// Records read from a file, remembering whether it held a single object.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub records: Vec<Record>,
    single: bool,
}

impl Batch {
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(record) => Ok(Self {
                records: vec![record],
                single: true,
            }),
            Value::Array(items) => {
                let records = items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| match item {
                        Value::Object(record) => Ok(record),
                        _ => bail!("element {i} is not a JSON object"),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self {
                    records,
                    single: false,
                })
            }
            _ => bail!("expected a JSON object or an array of objects"),
        }
    }

    /// Load a batch from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;
        Self::from_value(value).with_context(|| format!("unexpected shape in {}", path.display()))
    }

    /// Wrap transformed records in the same shape the batch was read in.
    pub fn reshape(&self, mut records: Vec<Record>) -> Value {
        if self.single && records.len() == 1 {
            records.pop().map(Value::Object).unwrap_or(Value::Null)
        } else {
            Value::Array(records.into_iter().map(Value::Object).collect())
        }
    }
}

/// Pretty-print `value` followed by a newline.
pub fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).context("failed to serialize output")?;
    writeln!(out)?;
    Ok(())
}
