//! Declarative endpoint and type manifest.
//!
//! A manifest lists the endpoints a service exposes and, optionally, the shapes
//! of types that cannot be recovered from Rust sources. It serves as both an
//! [`EndpointDescriptorProvider`] and a source of registry entries.
//!
//! ```yaml
//! title: Todo API
//! servers: [http://localhost:3000]
//! endpoints:
//!   - route: /todos/{id}
//!     method: GET
//!     group: Todos
//!     parameters:
//!       - { name: id, source: path, type: u64 }
//!     responses:
//!       - { status: 200, type: Todo }
//! types:
//!   Page<T>:
//!     kind: object
//!     properties:
//!       - { name: items, type: "Vec<T>" }
//! ```

use crate::endpoint::{EndpointDescriptor, EndpointDescriptorProvider, ParameterSource};
use crate::error::{Error, Result};
use crate::metadata::{TypeId, TypeShape};
use crate::type_registry::TypeRegistry;
use indexmap::IndexMap;
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub title: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    /// Addresses the service listens on
    pub servers: Vec<String>,
    pub endpoints: Vec<EndpointDescriptor>,
    /// Type shapes keyed by type identifier. Keys with generic arguments
    /// (`Page<T>`) declare templates over those parameter names.
    pub types: IndexMap<String, TypeShape>,
}

impl Manifest {
    /// Load a manifest, choosing the format by file extension (YAML unless `.json`)
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading manifest: {}", path.display());
        let content = fs::read_to_string(path).map_err(|e| Error::ManifestError {
            file: Some(path.to_path_buf()),
            message: e.to_string(),
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        };

        let manifest = parsed.map_err(|e| match e {
            Error::ManifestError { file: None, message } => Error::ManifestError {
                file: Some(path.to_path_buf()),
                message,
            },
            other => other,
        })?;
        info!(
            "Loaded {} endpoint(s) and {} type(s) from {}",
            manifest.endpoints.len(),
            manifest.types.len(),
            path.display()
        );
        Ok(manifest)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let manifest: Manifest =
            serde_yaml::from_str(content).map_err(|e| Error::ManifestError {
                file: None,
                message: e.to_string(),
            })?;
        Ok(manifest.normalized())
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let manifest: Manifest =
            serde_json::from_str(content).map_err(|e| Error::ManifestError {
                file: None,
                message: e.to_string(),
            })?;
        Ok(manifest.normalized())
    }

    /// Unwrap `Option<T>` in declared types; optional parameters and
    /// properties become not required.
    fn normalized(mut self) -> Self {
        for endpoint in &mut self.endpoints {
            for param in &mut endpoint.parameters {
                let (inner, optional) = param.type_id.clone().strip_optional();
                param.type_id = inner;
                if optional && param.source != ParameterSource::Path {
                    param.required = false;
                }
            }
            for response in &mut endpoint.responses {
                if let Some(type_id) = response.type_id.take() {
                    response.type_id = Some(type_id.strip_optional().0);
                }
            }
        }

        for shape in self.types.values_mut() {
            if let TypeShape::Object(object) = shape {
                for property in &mut object.properties {
                    let (inner, optional) = property.type_id.clone().strip_optional();
                    property.type_id = inner;
                    if optional {
                        property.required = false;
                    }
                }
            }
        }
        self
    }

    /// Add every declared type to `registry`
    pub fn register_types(&self, registry: &mut TypeRegistry) -> Result<()> {
        for (key, shape) in &self.types {
            let id: TypeId = key.parse().map_err(|message| Error::ManifestError {
                file: None,
                message: format!("invalid type name `{}`: {}", key, message),
            })?;
            if id.is_generic() && !id.is_array() {
                let params = id.args.iter().map(|arg| arg.to_string()).collect();
                registry.register_generic(id.path, params, shape.clone());
            } else {
                registry.register(id, shape.clone());
            }
        }
        Ok(())
    }
}

impl EndpointDescriptorProvider for Manifest {
    fn descriptors(&self) -> &[EndpointDescriptor] {
        &self.endpoints
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::HttpMethod;
    use crate::metadata::{PrimitiveType, TypeMetadataProvider};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MANIFEST: &str = r#"
title: Todo API
version: "2.0"
servers:
  - http://localhost:3000
endpoints:
  - route: /todos
    method: GET
    group: Todos
    parameters:
      - name: page
        source: query
        type: Option<u32>
        required: true
    responses:
      - status: 200
        type: Page<Todo>
  - route: /todos/{id}
    method: delete
    parameters:
      - { name: id, source: path, type: u64 }
types:
  Todo:
    kind: object
    properties:
      - { name: id, type: u64 }
      - { name: note, type: Option<String> }
  Status:
    kind: enum
    members: [Open, Done]
  Page<T>:
    kind: object
    properties:
      - { name: items, type: "Vec<T>" }
      - { name: total, type: u64 }
"#;

    #[test]
    fn test_parse_yaml_manifest() {
        let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();
        assert_eq!(manifest.title.as_deref(), Some("Todo API"));
        assert_eq!(manifest.version.as_deref(), Some("2.0"));
        assert_eq!(manifest.servers, vec!["http://localhost:3000"]);
        assert_eq!(manifest.descriptors().len(), 2);
        assert_eq!(manifest.endpoints[1].method, HttpMethod::Delete);
    }

    #[test]
    fn test_optional_types_are_unwrapped() {
        let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();

        let page = &manifest.endpoints[0].parameters[0];
        assert_eq!(page.type_id, TypeId::new("u32"));
        assert!(!page.required);

        match &manifest.types["Todo"] {
            TypeShape::Object(object) => {
                assert!(object.properties[0].required);
                assert!(!object.properties[1].required);
                assert_eq!(object.properties[1].type_id, TypeId::new("String"));
            }
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_register_types() {
        let manifest = Manifest::from_yaml_str(MANIFEST).unwrap();
        let mut registry = TypeRegistry::new();
        manifest.register_types(&mut registry).unwrap();

        assert!(matches!(
            registry.describe(&TypeId::new("Status")),
            Some(TypeShape::Enum(_))
        ));
        match registry.describe(&"Page<Todo>".parse().unwrap()) {
            Some(TypeShape::Object(object)) => {
                assert_eq!(object.properties[0].type_id.to_string(), "Vec<Todo>");
            }
            other => panic!("expected object, got {:?}", other),
        }
        assert_eq!(
            registry.describe(&TypeId::new("u64")),
            Some(TypeShape::primitive(PrimitiveType::U64))
        );
    }

    #[test]
    fn test_invalid_type_key() {
        let manifest = Manifest::from_yaml_str("types:\n  \"Page<T\":\n    kind: free_form\n").unwrap();
        let mut registry = TypeRegistry::new();
        let err = manifest.register_types(&mut registry).unwrap_err();
        assert!(err.to_string().contains("Page<T"));
    }

    #[test]
    fn test_load_json_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"endpoints": [{{"route": "/ping", "method": "GET"}}]}}"#
        )
        .unwrap();

        let manifest = Manifest::load(file.path()).unwrap();
        assert_eq!(manifest.endpoints[0].route.as_deref(), Some("/ping"));
        assert!(manifest.title.is_none());
    }

    #[test]
    fn test_load_reports_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "endpoints: [{{ method: FETCH }}]").unwrap();

        match Manifest::load(file.path()) {
            Err(Error::ManifestError { file: Some(path), .. }) => {
                assert_eq!(path, file.path());
            }
            other => panic!("expected manifest error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let result = Manifest::load(Path::new("/nonexistent/manifest.yaml"));
        assert!(matches!(result, Err(Error::ManifestError { .. })));
    }
}
