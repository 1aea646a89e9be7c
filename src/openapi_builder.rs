use crate::endpoint::{EndpointDescriptor, EndpointDescriptorProvider, HttpMethod};
use crate::error::{Error, Result};
use crate::metadata::TypeMetadataProvider;
use crate::operation_builder::OperationBuilder;
use crate::schema_generator::{Schema, SchemaGenerator};
use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// OpenAPI version written to every document
pub const OPENAPI_VERSION: &str = "3.1.0";

/// Version reported in the info block unless overridden
pub const DEFAULT_API_VERSION: &str = "1.0";

const FALLBACK_TITLE: &str = "Generated API";

/// OpenAPI document builder
pub struct OpenApiBuilder {
    /// OpenAPI info section
    info: Info,
    /// Addresses the service is reachable at
    servers: Vec<Server>,
    /// Treat a repeated route + method as an error instead of a warning
    deny_duplicates: bool,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title
    pub title: String,
    /// API version
    pub version: String,
    /// API description
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
}

/// OpenAPI Server object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
}

/// OpenAPI Tag object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub head: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub trace: Option<Operation>,
}

impl PathItem {
    fn slot(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Trace => &mut self.trace,
        }
    }

    pub fn set(&mut self, method: HttpMethod, operation: Operation) {
        *self.slot(method) = Some(operation);
    }

    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Trace => self.trace.as_ref(),
        }
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub operation_id: Option<String>,
    /// Parameters (path, query, header)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code
    pub responses: IndexMap<String, Response>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Parameter location (path, query, header)
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    pub required: bool,
    /// Content types and their schemas
    pub content: IndexMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub content: IndexMap<String, MediaType>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    /// Schema definitions keyed by canonical name
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub schemas: IndexMap<String, Schema>,
}

impl Components {
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub servers: Vec<Server>,
    /// Paths in first-appearance order
    pub paths: IndexMap<String, PathItem>,
    #[serde(skip_serializing_if = "Components::is_empty", default)]
    pub components: Components,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<Tag>,
}

/// Descriptors of one route, grouped by method in first-appearance order
type MethodGroups<'a> = IndexMap<HttpMethod, Vec<&'a EndpointDescriptor>>;

impl OpenApiBuilder {
    /// Create a builder titled after the running program.
    ///
    /// The version defaults to `1.0` and no servers are listed. The title also
    /// serves as the tag of endpoints that have neither tags nor a group.
    pub fn new() -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            info: Info {
                title: program_name(),
                version: DEFAULT_API_VERSION.to_string(),
                description: None,
            },
            servers: Vec::new(),
            deny_duplicates: false,
        }
    }

    /// Set custom info for the API
    ///
    /// # Arguments
    ///
    /// * `title` - Document title, also the default tag
    /// * `version` - Version of the described API, not of OpenAPI
    /// * `description` - Optional free text for `info.description`
    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.info = Info {
            title,
            version,
            description,
        };
        self
    }

    /// Set the addresses the service is listening on
    pub fn with_servers<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers = urls.into_iter().map(|url| Server { url: url.into() }).collect();
        self
    }

    /// Fail generation on a repeated route + method instead of keeping the first
    pub fn deny_duplicate_routes(mut self, deny: bool) -> Self {
        self.deny_duplicates = deny;
        self
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    /// Assemble a document from endpoint descriptors in one pass.
    ///
    /// The schema generator supplies the pass's cache; every schema it resolves
    /// ends up in `components`.
    ///
    /// # Arguments
    ///
    /// * `descriptors` - Endpoints in registration order
    /// * `schema_gen` - A fresh generator over the type metadata
    ///
    /// # Returns
    ///
    /// The document with paths in first-appearance order, the tags used and
    /// one component per object type.
    ///
    /// # Errors
    ///
    /// * `Error::MissingRelativePath` if a descriptor has no route
    /// * `Error::DuplicateRouteMethod` if duplicates are denied and a route
    ///   and method repeat
    /// * `Error::UnsupportedType` if a referenced type cannot be described
    pub fn assemble(
        &self,
        descriptors: &[EndpointDescriptor],
        mut schema_gen: SchemaGenerator,
    ) -> Result<OpenApiDocument> {
        debug!("Assembling document from {} endpoint(s)", descriptors.len());
        let routes = self.group_routes(descriptors)?;

        let mut operations = OperationBuilder::new(self.info.title.clone());
        let mut paths = IndexMap::new();
        for (route, methods) in routes {
            let mut path_item = PathItem::default();
            for (method, group) in methods {
                if let Some(operation) = operations.build(&group, &mut schema_gen)? {
                    path_item.set(method, operation);
                }
            }
            paths.insert(route, path_item);
        }

        let tags = operations
            .into_tags()
            .into_iter()
            .map(|name| Tag {
                name,
                description: None,
            })
            .collect();
        let components = Components {
            schemas: schema_gen.get_schemas(),
        };

        info!(
            "Assembled {} path(s) and {} component schema(s)",
            paths.len(),
            components.schemas.len()
        );

        Ok(OpenApiDocument {
            openapi: OPENAPI_VERSION.to_string(),
            info: self.info.clone(),
            servers: self.servers.clone(),
            paths,
            components,
            tags,
        })
    }

    /// Group descriptors by normalized route, then method
    fn group_routes<'a>(
        &self,
        descriptors: &'a [EndpointDescriptor],
    ) -> Result<IndexMap<String, MethodGroups<'a>>> {
        let mut routes: IndexMap<String, MethodGroups<'a>> = IndexMap::new();
        for descriptor in descriptors {
            let route = descriptor
                .route
                .as_deref()
                .ok_or_else(|| Error::MissingRelativePath {
                    method: descriptor.method.to_string(),
                    operation: descriptor.display_name().map(str::to_string),
                })?;
            routes
                .entry(normalize_route(route))
                .or_default()
                .entry(descriptor.method)
                .or_default()
                .push(descriptor);
        }

        for (route, methods) in &routes {
            for (method, group) in methods {
                if group.len() < 2 {
                    continue;
                }
                let duplicate = Error::DuplicateRouteMethod {
                    route: route.clone(),
                    method: method.to_string(),
                    dropped: group.len() - 1,
                };
                if self.deny_duplicates {
                    return Err(duplicate);
                }
                warn!("{}", duplicate);
            }
        }

        Ok(routes)
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip leading and trailing slashes, then re-add a single leading slash
pub fn normalize_route(route: &str) -> String {
    format!("/{}", route.trim().trim_matches('/'))
}

/// File stem of the running executable
fn program_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

/// Run one full generation pass over the given providers.
///
/// Every call starts from an empty schema cache, so passes never share
/// components.
///
/// # Errors
///
/// See [`OpenApiBuilder::assemble`].
pub fn generate_document(
    endpoints: &dyn EndpointDescriptorProvider,
    types: &dyn TypeMetadataProvider,
    builder: &OpenApiBuilder,
) -> Result<OpenApiDocument> {
    let schema_gen = SchemaGenerator::new(types);
    builder.assemble(endpoints.descriptors(), schema_gen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{ParameterDescriptor, ParameterSource, ResponseDescriptor};
    use crate::metadata::{ObjectShape, PropertyDef, TypeId, TypeShape};
    use crate::type_registry::TypeRegistry;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn id(s: &str) -> TypeId {
        s.parse().unwrap()
    }

    fn builder() -> OpenApiBuilder {
        OpenApiBuilder::new().with_info("Widgets".to_string(), "1.0".to_string(), None)
    }

    fn widget_registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register(
            id("Widget"),
            TypeShape::Object(ObjectShape {
                properties: vec![
                    PropertyDef::new("name", id("String")),
                    PropertyDef::new("count", id("i32")),
                ],
                ..ObjectShape::default()
            }),
        );
        registry
    }

    #[test]
    fn test_new_builder() {
        let builder = OpenApiBuilder::new();
        assert!(!builder.info().title.is_empty());
        assert_eq!(builder.info().version, "1.0");
        assert!(builder.info().description.is_none());
    }

    #[test]
    fn test_with_info() {
        let builder = OpenApiBuilder::new().with_info(
            "My API".to_string(),
            "2.0.0".to_string(),
            Some("Custom description".to_string()),
        );
        assert_eq!(builder.info().title, "My API");
        assert_eq!(builder.info().version, "2.0.0");
        assert_eq!(builder.info().description.as_deref(), Some("Custom description"));
    }

    #[test]
    fn test_normalize_route() {
        assert_eq!(normalize_route("widgets/{id}"), "/widgets/{id}");
        assert_eq!(normalize_route("/widgets/{id}/"), "/widgets/{id}");
        assert_eq!(normalize_route("//widgets"), "/widgets");
        assert_eq!(normalize_route(""), "/");
    }

    #[test]
    fn test_widget_document() {
        let registry = widget_registry();
        let endpoints = vec![EndpointDescriptor::new("/widgets/{id}", HttpMethod::Get)
            .with_parameter(ParameterDescriptor::new("id", ParameterSource::Path, id("i32")))
            .with_response(ResponseDescriptor::new(200, Some(id("Widget"))))];

        let document = generate_document(&endpoints, &registry, &builder()).unwrap();

        let expected = json!({
            "openapi": "3.1.0",
            "info": { "title": "Widgets", "version": "1.0" },
            "paths": {
                "/widgets/{id}": {
                    "get": {
                        "tags": ["Widgets"],
                        "operationId": "get_widgets_id",
                        "parameters": [{
                            "name": "id",
                            "in": "path",
                            "required": true,
                            "schema": { "type": "integer", "format": "int32" }
                        }],
                        "responses": {
                            "200": {
                                "description": "OK",
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Widget" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Widget": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string" },
                            "count": { "type": "integer", "format": "int32" }
                        },
                        "required": ["name", "count"]
                    }
                }
            },
            "tags": [{ "name": "Widgets" }]
        });

        assert_eq!(serde_json::to_value(&document).unwrap(), expected);
    }

    #[test]
    fn test_undeclared_responses_default_to_200() {
        let registry = TypeRegistry::new();
        let endpoints = vec![EndpointDescriptor::new("/ping", HttpMethod::Get)];
        let document = generate_document(&endpoints, &registry, &builder()).unwrap();

        let operation = document.paths["/ping"].operation(HttpMethod::Get).unwrap();
        assert_eq!(operation.responses.len(), 1);
        assert!(operation.responses.contains_key("200"));
    }

    #[test]
    fn test_routes_grouped_in_first_appearance_order() {
        let registry = TypeRegistry::new();
        let endpoints = vec![
            EndpointDescriptor::new("todos", HttpMethod::Get),
            EndpointDescriptor::new("/health", HttpMethod::Get),
            EndpointDescriptor::new("/todos/", HttpMethod::Post),
        ];
        let document = generate_document(&endpoints, &registry, &builder()).unwrap();

        let paths: Vec<_> = document.paths.keys().cloned().collect();
        assert_eq!(paths, vec!["/todos", "/health"]);
        let todos = &document.paths["/todos"];
        assert!(todos.get.is_some());
        assert!(todos.post.is_some());
        assert!(todos.delete.is_none());
    }

    #[test]
    fn test_duplicate_route_first_wins() {
        let registry = TypeRegistry::new();
        let mut first = EndpointDescriptor::new("/todos", HttpMethod::Get);
        first.operation_name = Some("listTodos".into());
        let mut second = EndpointDescriptor::new("todos", HttpMethod::Get);
        second.operation_name = Some("listTodosAgain".into());

        let document = generate_document(&vec![first, second], &registry, &builder()).unwrap();
        let operation = document.paths["/todos"].operation(HttpMethod::Get).unwrap();
        assert_eq!(operation.operation_id.as_deref(), Some("listTodos"));
    }

    #[test]
    fn test_duplicate_route_denied() {
        let registry = TypeRegistry::new();
        let endpoints = vec![
            EndpointDescriptor::new("/todos", HttpMethod::Get),
            EndpointDescriptor::new("/todos", HttpMethod::Get),
        ];
        let result = generate_document(&endpoints, &registry, &builder().deny_duplicate_routes(true));
        match result {
            Err(Error::DuplicateRouteMethod { route, method, dropped }) => {
                assert_eq!(route, "/todos");
                assert_eq!(method, "GET");
                assert_eq!(dropped, 1);
            }
            other => panic!("expected duplicate error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_route() {
        let registry = TypeRegistry::new();
        let mut descriptor = EndpointDescriptor::new("", HttpMethod::Delete);
        descriptor.route = None;
        descriptor.endpoint_name = Some("DeleteAll".into());

        let result = generate_document(&vec![descriptor], &registry, &builder());
        match result {
            Err(Error::MissingRelativePath { method, operation }) => {
                assert_eq!(method, "DELETE");
                assert_eq!(operation.as_deref(), Some("DeleteAll"));
            }
            other => panic!("expected missing route error, got {:?}", other),
        }
    }

    #[test]
    fn test_unsupported_type_aborts_generation() {
        let registry = TypeRegistry::new();
        let endpoints = vec![EndpointDescriptor::new("/callbacks", HttpMethod::Post)
            .with_parameter(ParameterDescriptor::new(
                "callback",
                ParameterSource::Body,
                TypeId::new("dyn Fn(i32)"),
            ))];

        let result = generate_document(&endpoints, &registry, &builder());
        assert!(matches!(result, Err(Error::UnsupportedType { .. })));
    }

    #[test]
    fn test_tags_and_servers() {
        let registry = TypeRegistry::new();
        let endpoints = vec![
            EndpointDescriptor::new("/todos", HttpMethod::Get).with_group("Todos"),
            EndpointDescriptor::new("/users", HttpMethod::Get).with_group("Users"),
            EndpointDescriptor::new("/todos/{id}", HttpMethod::Get).with_group("Todos"),
        ];
        let builder = builder().with_servers(["http://localhost:8080"]);
        let document = generate_document(&endpoints, &registry, &builder).unwrap();

        let tags: Vec<_> = document.tags.iter().map(|tag| tag.name.as_str()).collect();
        assert_eq!(tags, vec!["Todos", "Users"]);
        assert_eq!(document.servers[0].url, "http://localhost:8080");
    }

    #[test]
    fn test_components_cover_nested_types() {
        let mut registry = widget_registry();
        registry.register(
            id("Shelf"),
            TypeShape::Object(ObjectShape {
                properties: vec![PropertyDef::new("widgets", id("Vec<Widget>"))],
                ..ObjectShape::default()
            }),
        );
        let endpoints = vec![EndpointDescriptor::new("/shelves", HttpMethod::Get)
            .with_response(ResponseDescriptor::new(200, Some(id("Shelf"))))];

        let document = generate_document(&endpoints, &registry, &builder()).unwrap();
        let names: Vec<_> = document.components.schemas.keys().cloned().collect();
        assert_eq!(names, vec!["Shelf", "Widget"]);
    }

    #[test]
    fn test_passes_are_independent() {
        let registry = widget_registry();
        let endpoints = vec![EndpointDescriptor::new("/widgets", HttpMethod::Get)
            .with_response(ResponseDescriptor::new(200, Some(id("Vec<Widget>"))))];

        let first = generate_document(&endpoints, &registry, &builder()).unwrap();
        let second = generate_document(&endpoints, &registry, &builder()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.components.schemas.len(), 1);
    }

    #[test]
    fn test_empty_document_omits_optional_sections() {
        let registry = TypeRegistry::new();
        let endpoints: Vec<EndpointDescriptor> = Vec::new();
        let document = generate_document(&endpoints, &registry, &builder()).unwrap();

        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(
            value,
            json!({
                "openapi": "3.1.0",
                "info": { "title": "Widgets", "version": "1.0" },
                "paths": {}
            })
        );
    }
}
