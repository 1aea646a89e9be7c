//! Rendering of assembled documents as JSON or YAML text.

use crate::openapi_builder::OpenApiDocument;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serialize a document as YAML.
///
/// # Arguments
///
/// * `doc` - The assembled document
///
/// # Returns
///
/// The YAML text, keys in document order.
///
/// # Errors
///
/// Returns an error if a schema literal cannot be represented in YAML.
///
/// # Example
///
/// ```
/// use openapi_from_metadata::endpoint::EndpointDescriptor;
/// use openapi_from_metadata::openapi_builder::{generate_document, OpenApiBuilder};
/// use openapi_from_metadata::serializer::serialize_yaml;
/// use openapi_from_metadata::type_registry::TypeRegistry;
///
/// let endpoints: Vec<EndpointDescriptor> = Vec::new();
/// let builder = OpenApiBuilder::new().with_info("Empty".into(), "1.0".into(), None);
/// let doc = generate_document(&endpoints, &TypeRegistry::new(), &builder).unwrap();
/// let yaml = serialize_yaml(&doc).unwrap();
/// assert!(yaml.contains("openapi: 3.1.0"));
/// ```
pub fn serialize_yaml(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize OpenAPI document to YAML")
}

/// Serialize a document as pretty-printed JSON.
///
/// # Arguments
///
/// * `doc` - The assembled document
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize OpenAPI document to JSON")
}

/// Write `content` to `path`, creating parent directories as needed.
///
/// An existing file is overwritten.
///
/// # Arguments
///
/// * `content` - Serialized document
/// * `path` - Destination file
///
/// # Errors
///
/// Returns an error if a parent directory cannot be created or the file
/// cannot be written.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
