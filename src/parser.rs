use crate::error::Error;
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// A parsed Rust source file, the input of the type loader.
#[derive(Debug)]
pub struct SourceFile {
    pub path: PathBuf,
    pub syntax_tree: syn::File,
}

impl SourceFile {
    /// Read and parse one file
    pub fn parse(path: &Path) -> Result<Self> {
        debug!("Parsing file: {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;
        Ok(Self::parse_str(path, &content)?)
    }

    /// Parse source text already in memory; `path` is only used for reporting
    pub fn parse_str(path: impl Into<PathBuf>, content: &str) -> crate::error::Result<Self> {
        let path = path.into();
        let syntax_tree = syn::parse_file(content).map_err(|e| Error::ParseError {
            file: path.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { path, syntax_tree })
    }

    /// Parse every file, skipping (and logging) the ones that fail.
    ///
    /// Broken files only cost the types they define; everything else still loads.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<SourceFile> {
        let files: Vec<SourceFile> = paths
            .iter()
            .filter_map(|path| match Self::parse(path) {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!("Skipping {}: {:#}", path.display(), e);
                    None
                }
            })
            .collect();

        debug!(
            "Parsing complete: {} succeeded, {} failed",
            files.len(),
            paths.len() - files.len()
        );
        files
    }
}
