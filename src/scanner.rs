use anyhow::{bail, Result};
use log::{debug, warn};
use std::path::PathBuf;
use walkdir::WalkDir;

/// Directories never searched for type definitions
const DEFAULT_EXCLUDED: &[&str] = &["target"];

/// Collects the Rust source files of a project whose types should be described.
///
/// Hidden directories and `target` are skipped. Files are returned sorted so
/// that type loading, and with it component naming, does not depend on
/// directory iteration order.
///
/// # Example
///
/// ```no_run
/// use openapi_from_metadata::scanner::FileScanner;
///
/// let result = FileScanner::new("./my-service").exclude("benches").scan().unwrap();
/// println!("Found {} Rust files", result.rust_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
    excluded: Vec<String>,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// Discovered `.rs` files in path order
    pub rust_files: Vec<PathBuf>,
    /// Entries that could not be read
    pub warnings: Vec<String>,
}

impl FileScanner {
    /// Creates a new `FileScanner` for the specified root directory.
    ///
    /// # Arguments
    ///
    /// * `root_path` - The directory whose Rust files define the documented types
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            excluded: DEFAULT_EXCLUDED.iter().map(|dir| dir.to_string()).collect(),
        }
    }

    /// Skip every directory with this name, in addition to `target`.
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory name (not path) to leave out, e.g. `benches`
    pub fn exclude(mut self, dir: impl Into<String>) -> Self {
        self.excluded.push(dir.into());
        self
    }

    /// Walk the tree below the root path.
    ///
    /// Unreadable entries are logged and reported as warnings; only a root that
    /// is not a directory is an error.
    ///
    /// # Returns
    ///
    /// A `ScanResult` with the discovered files in path order and any warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if the root path is missing or not a directory.
    pub fn scan(&self) -> Result<ScanResult> {
        if !self.root_path.is_dir() {
            bail!("Source path is not a directory: {}", self.root_path.display());
        }
        debug!("Scanning {} for Rust sources", self.root_path.display());

        let mut rust_files = Vec::new();
        let mut warnings = Vec::new();

        let walker = WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.depth() == 0 {
                    return true;
                }
                let name = e.file_name().to_string_lossy();
                !name.starts_with('.') && !self.excluded.iter().any(|dir| *dir == name)
            });

        for entry in walker {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if entry.file_type().is_file()
                        && path.extension().and_then(|s| s.to_str()) == Some("rs")
                    {
                        rust_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        debug!("Found {} Rust file(s)", rust_files.len());
        Ok(ScanResult {
            rust_files,
            warnings,
        })
    }
}
