//! OpenAPI from metadata - OpenAPI 3.1 documents from endpoint descriptors and type metadata.
//!
//! Endpoints are described by an [`endpoint::EndpointDescriptorProvider`] and the
//! types they mention by a [`metadata::TypeMetadataProvider`]. One generation pass
//! turns both into an [`openapi_builder::OpenApiDocument`], with every object type
//! emitted once as a named component and referenced everywhere else.
//!
//! # Architecture
//!
//! 1. [`metadata`] - Type identifiers and the structural shapes types resolve to
//! 2. [`type_registry`] - In-memory metadata provider with aliases and generic templates
//! 3. [`naming`] - Deterministic, collision-free component names
//! 4. [`schema_generator`] - Resolves types into schemas and component references
//! 5. [`endpoint`] - Endpoint descriptors and their providers
//! 6. [`operation_builder`] - One operation per route and method
//! 7. [`openapi_builder`] - Groups endpoints and assembles the document
//! 8. [`serializer`] - Renders the document as YAML or JSON
//! 9. [`service`] - Generates once and serves the document as JSON
//!
//! Types can also be loaded from Rust sources: [`scanner`] finds the files,
//! [`parser`] parses them and [`type_loader`] turns structs and enums into registry
//! entries, honouring serde attributes. [`manifest`] reads endpoints (and extra
//! type shapes) from YAML or JSON.
//!
//! # Example Usage
//!
//! ```
//! use openapi_from_metadata::{
//!     endpoint::{EndpointDescriptor, HttpMethod, ResponseDescriptor},
//!     openapi_builder::{generate_document, OpenApiBuilder},
//!     parser::SourceFile,
//!     serializer::serialize_yaml,
//!     type_loader::TypeLoader,
//! };
//!
//! let source = SourceFile::parse_str(
//!     "models.rs",
//!     "pub struct Todo { pub id: u64, pub title: String }",
//! )
//! .unwrap();
//! let types = TypeLoader::load(&[source]);
//!
//! let endpoints = vec![EndpointDescriptor::new("/todos", HttpMethod::Get)
//!     .with_response(ResponseDescriptor::new(200, Some("Vec<Todo>".parse().unwrap())))];
//!
//! let builder = OpenApiBuilder::new().with_info("Todo API".into(), "1.0".into(), None);
//! let document = generate_document(&endpoints, &types, &builder).unwrap();
//! assert!(document.components.schemas.contains_key("Todo"));
//!
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod endpoint;
pub mod error;
pub mod manifest;
pub mod metadata;
pub mod naming;
pub mod openapi_builder;
pub mod operation_builder;
pub mod parser;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod service;
pub mod type_loader;
pub mod type_registry;
