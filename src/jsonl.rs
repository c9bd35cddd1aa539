// JSONL inventory format: one vehicle object per line

use crate::codec;
use crate::vehicle::Vehicle;
use eyre::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{info, warn};

/// Write one vehicle as a JSON line
pub fn write_line<W: Write>(writer: &mut W, vehicle: &Vehicle) -> Result<()> {
    let json = serde_json::to_string(&codec::encode_object(vehicle))?;
    writeln!(writer, "{}", json)?;
    Ok(())
}

/// Read all vehicles from a JSONL file, in file order.
///
/// Unreadable or malformed lines are skipped with a warning. Fields missing
/// from an object take their defaults.
pub fn read_jsonl(path: &Path) -> Result<Vec<Vehicle>> {
    let file = File::open(path).context("Failed to open JSONL file")?;
    let reader = BufReader::new(file);
    let mut vehicles = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to read line, skipping"
                );
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let value: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to parse JSON, skipping"
                );
                continue;
            }
        };

        if !value.is_object() {
            warn!(file = ?path, line = line_num + 1, "Line is not a JSON object, skipping");
            continue;
        }

        vehicles.push(codec::decode_object(&value));
    }

    info!(file = ?path, count = vehicles.len(), "Loaded vehicles from JSONL");

    Ok(vehicles)
}
