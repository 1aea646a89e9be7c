//! Endpoint descriptors: the routing layer's view of every registered operation.
//!
//! Descriptors are produced by whatever owns route registration and binding
//! (a framework integration, a manifest file, a test) and consumed by the
//! document assembler. Nothing here knows how requests are actually routed.
//!
//! # Example
//!
//! ```
//! use openapi_from_metadata::endpoint::{
//!     EndpointDescriptor, HttpMethod, ParameterDescriptor, ParameterSource, ResponseDescriptor,
//! };
//!
//! let mut endpoint = EndpointDescriptor::new("/widgets/{id}", HttpMethod::Get);
//! endpoint.parameters.push(ParameterDescriptor::new(
//!     "id",
//!     ParameterSource::Path,
//!     "i32".parse().unwrap(),
//! ));
//! endpoint.responses.push(ResponseDescriptor::new(200, Some("Widget".parse().unwrap())));
//! assert_eq!(endpoint.method.as_str(), "GET");
//! ```

use crate::metadata::TypeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Source of endpoint descriptors.
///
/// Implementations must return a stable, finite sequence; the assembler reads
/// it once per pass.
pub trait EndpointDescriptorProvider {
    fn descriptors(&self) -> &[EndpointDescriptor];
}

impl EndpointDescriptorProvider for Vec<EndpointDescriptor> {
    fn descriptors(&self) -> &[EndpointDescriptor] {
        self
    }
}

impl EndpointDescriptorProvider for [EndpointDescriptor] {
    fn descriptors(&self) -> &[EndpointDescriptor] {
        self
    }
}

/// Metadata for one registered route + method pair.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDescriptor {
    /// Route template relative to the application root (e.g. "widgets/{id}")
    #[serde(default)]
    pub route: Option<String>,
    pub method: HttpMethod,
    /// Owning group (controller or module) name, used as the fallback tag
    #[serde(default)]
    pub group: Option<String>,
    /// Parameters in binding order
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    /// Declared responses; empty means a single untyped 200
    #[serde(default)]
    pub responses: Vec<ResponseDescriptor>,
    /// Media types accepted for the request body
    #[serde(default)]
    pub request_formats: Vec<String>,
    /// Explicit response content type annotations, overriding response formats
    #[serde(default)]
    pub produces: Vec<String>,
    /// Explicit route name
    #[serde(default)]
    pub operation_name: Option<String>,
    /// Name assigned through endpoint metadata
    #[serde(default)]
    pub endpoint_name: Option<String>,
    /// Explicit tag metadata
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl EndpointDescriptor {
    /// Create a descriptor with only a route and method
    pub fn new(route: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            route: Some(route.into()),
            method,
            group: None,
            parameters: Vec::new(),
            responses: Vec::new(),
            request_formats: Vec::new(),
            produces: Vec::new(),
            operation_name: None,
            endpoint_name: None,
            tags: None,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_response(mut self, response: ResponseDescriptor) -> Self {
        self.responses.push(response);
        self
    }

    /// Best available human-readable handle, for diagnostics
    pub fn display_name(&self) -> Option<&str> {
        self.operation_name
            .as_deref()
            .or(self.endpoint_name.as_deref())
    }
}

/// HTTP methods an operation can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
    #[serde(alias = "put")]
    Put,
    #[serde(alias = "delete")]
    Delete,
    #[serde(alias = "patch")]
    Patch,
    #[serde(alias = "options")]
    Options,
    #[serde(alias = "head")]
    Head,
    #[serde(alias = "trace")]
    Trace,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a parameter value is bound from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterSource {
    /// Path segment embedded in the route (e.g. `/users/{id}`)
    Path,
    /// Query string (e.g. `?page=1`)
    Query,
    Header,
    /// Request body
    Body,
    /// Form fields
    Form,
}

impl ParameterSource {
    /// OpenAPI `in` value; body and form parameters have none
    pub fn location(&self) -> Option<&'static str> {
        match self {
            ParameterSource::Path => Some("path"),
            ParameterSource::Query => Some("query"),
            ParameterSource::Header => Some("header"),
            ParameterSource::Body | ParameterSource::Form => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub source: ParameterSource,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "type")]
    pub type_id: TypeId,
    /// Default applied when the parameter is absent
    #[serde(default)]
    pub default: Option<Value>,
}

impl ParameterDescriptor {
    /// Create a parameter; path parameters start out required
    pub fn new(name: impl Into<String>, source: ParameterSource, type_id: TypeId) -> Self {
        Self {
            name: name.into(),
            required: source == ParameterSource::Path,
            source,
            type_id,
            default: None,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// One declared response of an endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseDescriptor {
    #[serde(default = "default_status")]
    pub status: u16,
    /// Catch-all response, reported under 200
    #[serde(default)]
    pub is_default: bool,
    /// Body type; `None` for responses without content
    #[serde(default, rename = "type")]
    pub type_id: Option<TypeId>,
    /// Media types this response is produced in
    #[serde(default)]
    pub formats: Vec<String>,
}

fn default_status() -> u16 {
    200
}

impl ResponseDescriptor {
    pub fn new(status: u16, type_id: Option<TypeId>) -> Self {
        Self {
            status,
            is_default: false,
            type_id,
            formats: Vec::new(),
        }
    }

    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.formats = formats.into_iter().map(Into::into).collect();
        self
    }

    /// Status code the response is documented under
    pub fn effective_status(&self) -> u16 {
        if self.is_default {
            200
        } else {
            self.status
        }
    }
}
