use crate::endpoint::{EndpointDescriptor, ParameterSource, ResponseDescriptor};
use crate::error::Result;
use crate::openapi_builder::{MediaType, Operation, Parameter, RequestBody, Response};
use crate::schema_generator::SchemaGenerator;
use indexmap::{IndexMap, IndexSet};
use log::debug;

/// Media type used when a descriptor declares none
pub const DEFAULT_MEDIA_TYPE: &str = "application/json";

/// Builds one OpenAPI operation per route + method group and records every tag
/// it hands out.
pub struct OperationBuilder {
    /// Tag used when a descriptor has neither explicit tags nor a group
    default_tag: String,
    captured_tags: IndexSet<String>,
}

impl OperationBuilder {
    pub fn new(default_tag: impl Into<String>) -> Self {
        Self {
            default_tag: default_tag.into(),
            captured_tags: IndexSet::new(),
        }
    }

    /// Build the operation for all descriptors sharing one route and method.
    ///
    /// Only the first descriptor is used. Returns `None` for an empty group.
    pub fn build(
        &mut self,
        group: &[&EndpointDescriptor],
        schema_gen: &mut SchemaGenerator,
    ) -> Result<Option<Operation>> {
        let Some(descriptor) = group.first() else {
            return Ok(None);
        };
        debug!(
            "Building operation: {} {}",
            descriptor.method,
            descriptor.route.as_deref().unwrap_or_default()
        );

        let tags = self.tags_for(descriptor);
        for tag in &tags {
            self.captured_tags.insert(tag.clone());
        }

        Ok(Some(Operation {
            tags,
            operation_id: Some(Self::operation_id(descriptor)),
            parameters: Self::parameters(descriptor, schema_gen)?,
            request_body: Self::request_body(descriptor, schema_gen)?,
            responses: Self::responses(descriptor, schema_gen)?,
        }))
    }

    /// Tags handed out so far, in first-seen order
    pub fn captured_tags(&self) -> &IndexSet<String> {
        &self.captured_tags
    }

    pub fn into_tags(self) -> IndexSet<String> {
        self.captured_tags
    }

    fn tags_for(&self, descriptor: &EndpointDescriptor) -> Vec<String> {
        if let Some(tags) = &descriptor.tags {
            return tags.clone();
        }
        vec![descriptor
            .group
            .clone()
            .unwrap_or_else(|| self.default_tag.clone())]
    }

    /// Explicit route name, then endpoint name, then `{method}_{route}`
    pub fn operation_id(descriptor: &EndpointDescriptor) -> String {
        if let Some(name) = descriptor.display_name() {
            return name.to_string();
        }
        Self::generate_operation_id(descriptor)
    }

    fn generate_operation_id(descriptor: &EndpointDescriptor) -> String {
        let route = descriptor
            .route
            .as_deref()
            .unwrap_or_default()
            .trim_matches('/')
            .replace(['/', '-'], "_")
            .replace(['{', '}'], "");
        format!("{}_{}", descriptor.method.as_str().to_lowercase(), route)
    }

    fn parameters(
        descriptor: &EndpointDescriptor,
        schema_gen: &mut SchemaGenerator,
    ) -> Result<Vec<Parameter>> {
        let mut parameters = Vec::new();
        for param in &descriptor.parameters {
            let Some(location) = param.source.location() else {
                continue;
            };
            debug!("Generating parameter schema for: {}", param.name);
            let schema = schema_gen.resolve_with_default(&param.type_id, param.default.as_ref())?;
            parameters.push(Parameter {
                name: param.name.clone(),
                location: location.to_string(),
                required: param.source == ParameterSource::Path || param.required,
                schema,
                description: None,
            });
        }
        Ok(parameters)
    }

    fn request_body(
        descriptor: &EndpointDescriptor,
        schema_gen: &mut SchemaGenerator,
    ) -> Result<Option<RequestBody>> {
        let Some(body) = descriptor
            .parameters
            .iter()
            .find(|param| param.source == ParameterSource::Body)
        else {
            return Ok(None);
        };

        let schema = schema_gen.resolve_with_default(&body.type_id, body.default.as_ref())?;
        let content = media_types(&descriptor.request_formats)
            .into_iter()
            .map(|media_type| {
                (
                    media_type,
                    MediaType {
                        schema: schema.clone(),
                    },
                )
            })
            .collect();

        Ok(Some(RequestBody {
            description: None,
            required: true,
            content,
        }))
    }

    fn responses(
        descriptor: &EndpointDescriptor,
        schema_gen: &mut SchemaGenerator,
    ) -> Result<IndexMap<String, Response>> {
        let declared = if descriptor.responses.is_empty() {
            vec![ResponseDescriptor::new(200, None)]
        } else {
            descriptor.responses.clone()
        };

        let mut responses = IndexMap::new();
        for response in &declared {
            let status = response.effective_status();
            let key = status.to_string();
            if responses.contains_key(&key) {
                debug!("Ignoring repeated response {} for {}", key, descriptor.method);
                continue;
            }

            let mut content = IndexMap::new();
            if let Some(type_id) = &response.type_id {
                let schema = schema_gen.resolve(type_id)?;
                let formats = if !descriptor.produces.is_empty() {
                    &descriptor.produces
                } else {
                    &response.formats
                };
                for media_type in media_types(formats) {
                    content.insert(
                        media_type,
                        MediaType {
                            schema: (*schema).clone(),
                        },
                    );
                }
            }

            responses.insert(
                key,
                Response {
                    description: reason_phrase(status).to_string(),
                    content,
                },
            );
        }
        Ok(responses)
    }
}

/// Deduplicated media types, falling back to JSON
fn media_types(declared: &[String]) -> IndexSet<String> {
    if declared.is_empty() {
        return IndexSet::from([DEFAULT_MEDIA_TYPE.to_string()]);
    }
    declared.iter().cloned().collect()
}

/// Standard reason phrase for a status code
pub fn reason_phrase(status: u16) -> &'static str {
    http::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Response")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::{HttpMethod, ParameterDescriptor};
    use crate::metadata::{ObjectShape, PropertyDef, TypeId, TypeShape};
    use crate::schema_generator::{SchemaKind, SchemaType};
    use crate::type_registry::TypeRegistry;
    use serde_json::json;

    fn id(s: &str) -> TypeId {
        s.parse().unwrap()
    }

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.register(
            id("Todo"),
            TypeShape::Object(ObjectShape {
                properties: vec![
                    PropertyDef::new("id", id("i32")),
                    PropertyDef::new("title", id("String")),
                ],
                ..ObjectShape::default()
            }),
        );
        registry
    }

    fn build(descriptor: &EndpointDescriptor, registry: &TypeRegistry) -> Operation {
        let mut schema_gen = SchemaGenerator::new(registry);
        let mut builder = OperationBuilder::new("app");
        builder
            .build(&[descriptor], &mut schema_gen)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_empty_group_builds_nothing() {
        let registry = registry();
        let mut schema_gen = SchemaGenerator::new(&registry);
        let mut builder = OperationBuilder::new("app");
        assert!(builder.build(&[], &mut schema_gen).unwrap().is_none());
    }

    #[test]
    fn test_generated_operation_id() {
        let descriptor = EndpointDescriptor::new("/test-with-route-params/{id}/{name}", HttpMethod::Get);
        assert_eq!(
            OperationBuilder::operation_id(&descriptor),
            "get_test_with_route_params_id_name"
        );
    }

    #[test]
    fn test_operation_id_precedence() {
        let mut descriptor = EndpointDescriptor::new("/todos", HttpMethod::Post);
        descriptor.endpoint_name = Some("CreateTodo".into());
        assert_eq!(OperationBuilder::operation_id(&descriptor), "CreateTodo");

        descriptor.operation_name = Some("todos.create".into());
        assert_eq!(OperationBuilder::operation_id(&descriptor), "todos.create");
    }

    #[test]
    fn test_tags_are_captured() {
        let registry = registry();
        let mut schema_gen = SchemaGenerator::new(&registry);
        let mut builder = OperationBuilder::new("app");

        let mut tagged = EndpointDescriptor::new("/a", HttpMethod::Get);
        tagged.tags = Some(vec!["admin".into(), "todos".into()]);
        let grouped = EndpointDescriptor::new("/b", HttpMethod::Get).with_group("todos");
        let bare = EndpointDescriptor::new("/c", HttpMethod::Get);

        let op = builder.build(&[&tagged], &mut schema_gen).unwrap().unwrap();
        assert_eq!(op.tags, vec!["admin", "todos"]);
        let op = builder.build(&[&grouped], &mut schema_gen).unwrap().unwrap();
        assert_eq!(op.tags, vec!["todos"]);
        let op = builder.build(&[&bare], &mut schema_gen).unwrap().unwrap();
        assert_eq!(op.tags, vec!["app"]);

        let captured: Vec<_> = builder.into_tags().into_iter().collect();
        assert_eq!(captured, vec!["admin", "todos", "app"]);
    }

    #[test]
    fn test_parameters_exclude_body_and_form() {
        let registry = registry();
        let descriptor = EndpointDescriptor::new("/todos/{id}", HttpMethod::Put)
            .with_parameter(ParameterDescriptor::new("id", ParameterSource::Path, id("i32")).required(false))
            .with_parameter(ParameterDescriptor::new("verbose", ParameterSource::Query, id("bool")))
            .with_parameter(ParameterDescriptor::new("X-Trace", ParameterSource::Header, id("String")).required(true))
            .with_parameter(ParameterDescriptor::new("todo", ParameterSource::Body, id("Todo")))
            .with_parameter(ParameterDescriptor::new("file", ParameterSource::Form, id("String")));

        let op = build(&descriptor, &registry);
        assert_eq!(op.parameters.len(), 3);

        assert_eq!(op.parameters[0].location, "path");
        assert!(op.parameters[0].required, "path parameters are always required");
        assert_eq!(op.parameters[1].location, "query");
        assert!(!op.parameters[1].required);
        assert_eq!(op.parameters[2].location, "header");
        assert!(op.parameters[2].required);
    }

    #[test]
    fn test_parameter_default_value() {
        let registry = registry();
        let descriptor = EndpointDescriptor::new("/todos", HttpMethod::Get).with_parameter(
            ParameterDescriptor::new("age", ParameterSource::Query, id("i32")).with_default(json!(42)),
        );
        let op = build(&descriptor, &registry);
        assert_eq!(op.parameters[0].schema.default, Some(json!(42)));
        assert_eq!(op.parameters[0].schema.schema_type, Some(SchemaType::Integer));
    }

    #[test]
    fn test_request_body_defaults_to_json() {
        let registry = registry();
        let descriptor = EndpointDescriptor::new("/todos", HttpMethod::Post)
            .with_parameter(ParameterDescriptor::new("todo", ParameterSource::Body, id("Todo")));

        let op = build(&descriptor, &registry);
        let body = op.request_body.unwrap();
        assert!(body.required);
        assert_eq!(body.content.len(), 1);
        assert_eq!(
            body.content["application/json"].schema.reference_name(),
            Some("Todo")
        );
    }

    #[test]
    fn test_request_body_uses_declared_formats() {
        let registry = registry();
        let mut descriptor = EndpointDescriptor::new("/todos", HttpMethod::Post)
            .with_parameter(ParameterDescriptor::new("todo", ParameterSource::Body, id("Todo")));
        descriptor.request_formats = vec![
            "application/json".into(),
            "application/xml".into(),
            "application/json".into(),
        ];

        let op = build(&descriptor, &registry);
        let keys: Vec<_> = op.request_body.unwrap().content.keys().cloned().collect();
        assert_eq!(keys, vec!["application/json", "application/xml"]);
    }

    #[test]
    fn test_no_request_body_without_body_parameter() {
        let registry = registry();
        let descriptor = EndpointDescriptor::new("/upload", HttpMethod::Post)
            .with_parameter(ParameterDescriptor::new("file", ParameterSource::Form, id("String")));
        let op = build(&descriptor, &registry);
        assert!(op.request_body.is_none());
        assert!(op.parameters.is_empty());
    }

    #[test]
    fn test_default_response_is_200() {
        let registry = registry();
        let descriptor = EndpointDescriptor::new("/health", HttpMethod::Get);
        let op = build(&descriptor, &registry);

        assert_eq!(op.responses.len(), 1);
        let response = &op.responses["200"];
        assert_eq!(response.description, "OK");
        assert!(response.content.is_empty());
    }

    #[test]
    fn test_response_descriptions_and_content() {
        let registry = registry();
        let descriptor = EndpointDescriptor::new("/todos", HttpMethod::Post)
            .with_response(ResponseDescriptor::new(201, Some(id("Todo"))).with_formats(["application/json"]))
            .with_response(ResponseDescriptor::new(404, None));

        let op = build(&descriptor, &registry);
        let keys: Vec<_> = op.responses.keys().cloned().collect();
        assert_eq!(keys, vec!["201", "404"]);
        assert_eq!(op.responses["201"].description, "Created");
        assert_eq!(op.responses["404"].description, "Not Found");
        assert!(op.responses["404"].content.is_empty());

        let schema = &op.responses["201"].content["application/json"].schema;
        assert_eq!(schema.kind(), SchemaKind::Reference);
    }

    #[test]
    fn test_explicit_produces_overrides_response_formats() {
        let registry = registry();
        let mut descriptor = EndpointDescriptor::new("/todos", HttpMethod::Get).with_response(
            ResponseDescriptor::new(200, Some(id("Vec<Todo>"))).with_formats(["application/json"]),
        );
        descriptor.produces = vec!["text/csv".into()];

        let op = build(&descriptor, &registry);
        let content = &op.responses["200"].content;
        assert_eq!(content.len(), 1);
        assert_eq!(content["text/csv"].schema.kind(), SchemaKind::Array);
    }

    #[test]
    fn test_unknown_status_has_fallback_description() {
        assert_eq!(reason_phrase(299), "Response");
        assert_eq!(reason_phrase(418), "I'm a teapot");
    }
}
