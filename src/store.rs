// In-memory vehicle inventory backed by a flat file

use crate::codec;
use crate::jsonl;
use crate::query::{FilterCriteria, SearchField, SortKey};
use crate::seed;
use crate::vehicle::Vehicle;
use eyre::{Context, Result};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// On-disk layout of the inventory file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Twelve `|`-delimited fields per line
    Pipe,
    /// One JSON object per line
    Jsonl,
}

impl Format {
    /// `.jsonl` files use JSON lines, everything else the pipe format
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("jsonl") => Format::Jsonl,
            _ => Format::Pipe,
        }
    }
}

/// Authoritative vehicle collection.
///
/// Queries return fresh vectors and never reorder the collection. Every
/// successful mutation rewrites the backing file in full.
#[derive(Debug)]
pub struct Inventory {
    path: PathBuf,
    vehicles: Vec<Vehicle>,
}

impl Inventory {
    /// Create an empty inventory persisting to `path`. Nothing is read.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            vehicles: Vec::new(),
        }
    }

    /// Open the inventory at `path`.
    ///
    /// An existing file is loaded. A missing file is seeded with the default
    /// fleet (when `seed` is set) and saved straight away.
    pub fn open<P: AsRef<Path>>(path: P, seed: bool) -> Result<Self> {
        let mut inventory = Self::new(path);
        let path = inventory.path.clone();

        if path.exists() {
            inventory.load(&path)?;
        } else if seed {
            info!(path = ?path, "Inventory file missing, seeding default fleet");
            inventory.vehicles = seed::default_fleet();
            inventory.persist();
        } else {
            info!(path = ?path, "Inventory file missing, starting empty");
        }

        Ok(inventory)
    }

    /// Backing file of this inventory
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Replace the collection with the contents of `path`.
    ///
    /// Returns the number of vehicles loaded, or `None` if the file does not
    /// exist, in which case the collection is left untouched. Malformed lines
    /// are logged and skipped.
    pub fn load(&mut self, path: &Path) -> Result<Option<usize>> {
        if !path.exists() {
            warn!(path = ?path, "Inventory file not found, nothing to load");
            return Ok(None);
        }

        let vehicles = match Format::for_path(path) {
            Format::Jsonl => jsonl::read_jsonl(path)?,
            Format::Pipe => read_pipe_file(path)?,
        };

        self.vehicles = vehicles;
        info!(path = ?path, count = self.vehicles.len(), "Loaded inventory");
        Ok(Some(self.vehicles.len()))
    }

    /// Write the full collection to `path`.
    ///
    /// The data goes to a sibling `.tmp` file under an exclusive lock and is
    /// renamed over `path` once synced, so a crash never leaves a truncated
    /// inventory behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create inventory directory")?;
        }

        let tmp_path = temp_path(path);
        if let Err(e) = self.write_replacing(&tmp_path, path) {
            // Nothing to clean up if the temp file was never created
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        info!(path = ?path, count = self.vehicles.len(), "Saved inventory");
        Ok(())
    }

    fn write_replacing(&self, tmp_path: &Path, path: &Path) -> Result<()> {
        let file = File::create(tmp_path).context("Failed to create temporary inventory file")?;
        file.lock_exclusive().context("Failed to acquire file lock")?;

        let mut writer = BufWriter::new(file);
        let format = Format::for_path(path);
        for vehicle in &self.vehicles {
            match format {
                Format::Pipe => writeln!(writer, "{}", codec::encode_line(vehicle))?,
                Format::Jsonl => jsonl::write_line(&mut writer, vehicle)?,
            }
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(tmp_path, path).context("Failed to replace inventory file")
    }

    /// Save to the backing file. Failures are logged, never propagated.
    fn persist(&self) {
        if let Err(e) = self.save(&self.path) {
            error!(path = ?self.path, error = ?e, "Failed to save inventory");
        }
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    /// Copy of every vehicle in insertion order
    pub fn get_all(&self) -> Vec<Vehicle> {
        self.vehicles.clone()
    }

    /// Whether any vehicle carries this name
    pub fn contains(&self, name: &str) -> bool {
        self.vehicles.iter().any(|v| v.name == name)
    }

    /// Append a vehicle. No uniqueness check happens here.
    pub fn add(&mut self, vehicle: Vehicle) {
        debug!(name = %vehicle.name, "Adding vehicle");
        self.vehicles.push(vehicle);
        self.persist();
    }

    /// Replace the first vehicle with the same name. Returns false if none
    /// matched.
    pub fn update(&mut self, vehicle: Vehicle) -> bool {
        let Some(existing) = self.vehicles.iter_mut().find(|v| v.name == vehicle.name) else {
            return false;
        };

        debug!(name = %vehicle.name, "Updating vehicle");
        *existing = vehicle;
        self.persist();
        true
    }

    /// Remove every vehicle with this name. Returns true if at least one went.
    pub fn delete(&mut self, name: &str) -> bool {
        let before = self.vehicles.len();
        self.vehicles.retain(|v| v.name != name);
        let removed = before - self.vehicles.len();

        if removed == 0 {
            return false;
        }

        debug!(name, removed, "Deleted vehicles");
        self.persist();
        true
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Case-insensitive substring search on one field.
    ///
    /// An unknown field compares against the empty string, so it only
    /// matches an empty query.
    pub fn search(&self, query: &str, field: &str) -> Vec<Vehicle> {
        let field = SearchField::from_name(field);
        let needle = query.to_lowercase();

        self.vehicles
            .iter()
            .filter(|v| {
                let value = field.map(|f| f.value(v)).unwrap_or_default();
                value.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// Vehicles passing every predicate of `criteria`, in collection order
    pub fn filter(&self, criteria: &FilterCriteria) -> Vec<Vehicle> {
        self.vehicles.iter().filter(|v| criteria.matches(v)).cloned().collect()
    }

    /// Sorted copy of the collection. The sort is stable in both directions:
    /// vehicles with equal keys keep their collection order.
    pub fn sort(&self, key: SortKey, ascending: bool) -> Vec<Vehicle> {
        let mut sorted = self.vehicles.clone();
        if ascending {
            sorted.sort_by(|a, b| key.compare(a, b));
        } else {
            sorted.sort_by(|a, b| key.compare(b, a));
        }
        sorted
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn read_pipe_file(path: &Path) -> Result<Vec<Vehicle>> {
    let content = fs::read(path).context("Failed to read inventory file")?;
    let mut vehicles = Vec::new();

    for (line_num, raw) in content.split(|&b| b == b'\n').enumerate() {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let Ok(line) = std::str::from_utf8(raw) else {
            warn!(file = ?path, line = line_num + 1, "Inventory line is not valid UTF-8, skipping");
            continue;
        };
        if line.trim().is_empty() {
            continue;
        }

        match codec::decode_line(line) {
            Ok(vehicle) => vehicles.push(vehicle),
            Err(e) => warn!(
                file = ?path,
                line = line_num + 1,
                found = e.found,
                content = %line,
                "Malformed inventory line, skipping"
            ),
        }
    }

    Ok(vehicles)
}
