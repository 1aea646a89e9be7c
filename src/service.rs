//! Serving surface for a generated document.
//!
//! The document is generated on first use, at most once, and cached for the
//! lifetime of the service. Any number of threads may read it afterwards.

use crate::error::Result;
use crate::manifest::Manifest;
use crate::openapi_builder::{generate_document, OpenApiBuilder, OpenApiDocument};
use crate::type_registry::TypeRegistry;
use http::{Method, StatusCode};
use log::{debug, error, info};
use std::sync::OnceLock;

/// Route the document is served under unless configured otherwise
pub const DEFAULT_DOCUMENT_PATH: &str = "/openapi.json";

pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

type Generate = Box<dyn Fn() -> Result<OpenApiDocument> + Send + Sync>;

/// Outcome of a single generation attempt
struct Generated {
    document: Option<OpenApiDocument>,
    /// Serialized document, or the error envelope
    body: String,
    status: StatusCode,
}

/// A response ready to be written by the hosting HTTP layer
#[derive(Debug, Clone, PartialEq)]
pub struct ServeResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

pub struct DocumentService {
    path: String,
    generate: Generate,
    generated: OnceLock<Generated>,
}

impl DocumentService {
    pub fn new<F>(generate: F) -> Self
    where
        F: Fn() -> Result<OpenApiDocument> + Send + Sync + 'static,
    {
        Self {
            path: DEFAULT_DOCUMENT_PATH.to_string(),
            generate: Box::new(generate),
            generated: OnceLock::new(),
        }
    }

    /// Service over a manifest's endpoints and an already loaded registry
    pub fn for_manifest(manifest: Manifest, types: TypeRegistry, builder: OpenApiBuilder) -> Self {
        Self::new(move || generate_document(&manifest, &types, &builder))
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn generated(&self) -> &Generated {
        self.generated.get_or_init(|| {
            debug!("Generating OpenAPI document for {}", self.path);
            let outcome = (self.generate)().and_then(|document| {
                let body = serde_json::to_string(&document)?;
                Ok((document, body))
            });
            match outcome {
                Ok((document, body)) => {
                    info!("OpenAPI document ready at {}", self.path);
                    Generated {
                        document: Some(document),
                        body,
                        status: StatusCode::OK,
                    }
                }
                Err(e) => {
                    error!("OpenAPI document generation failed: {}", e);
                    Generated {
                        document: None,
                        body: serde_json::json!({ "message": e.to_string() }).to_string(),
                        status: StatusCode::INTERNAL_SERVER_ERROR,
                    }
                }
            }
        })
    }

    /// The cached document, or `None` when generation failed
    pub fn document(&self) -> Option<&OpenApiDocument> {
        self.generated().document.as_ref()
    }

    /// The document as JSON (200), or `{"message": ..}` (500)
    pub fn respond(&self) -> ServeResponse {
        let generated = self.generated();
        ServeResponse {
            status: generated.status,
            content_type: JSON_CONTENT_TYPE,
            body: generated.body.clone(),
        }
    }

    /// Respond to `GET` requests for the document path; `None` for anything else
    pub fn handle(&self, method: &Method, path: &str) -> Option<ServeResponse> {
        if method != Method::GET || path.trim_end_matches('/') != self.path.trim_end_matches('/') {
            return None;
        }
        Some(self.respond())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{EndpointDescriptor, HttpMethod, ParameterDescriptor, ParameterSource};
    use crate::error::Error;
    use crate::metadata::TypeId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn builder() -> OpenApiBuilder {
        OpenApiBuilder::new().with_info("Todo API".to_string(), "1.0".to_string(), None)
    }

    fn manifest(endpoints: Vec<EndpointDescriptor>) -> Manifest {
        Manifest {
            endpoints,
            ..Manifest::default()
        }
    }

    #[test]
    fn test_respond_with_document() {
        let service = DocumentService::for_manifest(
            manifest(vec![EndpointDescriptor::new("/todos", HttpMethod::Get)]),
            TypeRegistry::new(),
            builder(),
        );

        let response = service.respond();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.content_type, JSON_CONTENT_TYPE);

        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body["info"]["title"], "Todo API");
        assert!(body["paths"]["/todos"]["get"].is_object());
        assert!(service.document().is_some());
    }

    #[test]
    fn test_respond_with_error_envelope() {
        let endpoint = EndpointDescriptor::new("/hooks", HttpMethod::Post).with_parameter(
            ParameterDescriptor::new("hook", ParameterSource::Body, TypeId::new("dyn Fn()")),
        );
        let service =
            DocumentService::for_manifest(manifest(vec![endpoint]), TypeRegistry::new(), builder());

        let response = service.respond();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = serde_json::from_str(&response.body).unwrap();
        assert!(body["message"].as_str().unwrap().contains("dyn Fn()"));
        assert!(service.document().is_none());
    }

    #[test]
    fn test_generates_once_across_threads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let service = DocumentService::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::SerializationError("boom".to_string()))
        });

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    assert_eq!(service.respond().status, StatusCode::INTERNAL_SERVER_ERROR);
                });
            }
        });
        service.respond();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_handle_matches_document_path() {
        let service = DocumentService::for_manifest(manifest(Vec::new()), TypeRegistry::new(), builder())
            .with_path("/docs/openapi.json");

        assert_eq!(service.path(), "/docs/openapi.json");
        assert!(service.handle(&Method::GET, "/docs/openapi.json").is_some());
        assert!(service.handle(&Method::GET, DEFAULT_DOCUMENT_PATH).is_none());
        assert!(service.handle(&Method::POST, "/docs/openapi.json").is_none());
    }
}
