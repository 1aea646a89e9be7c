use crate::error::{Error, Result};
use crate::metadata::{
    Constraints, EnumShape, ObjectShape, PrimitiveType, PropertyDef, TypeId, TypeMetadataProvider,
    TypeShape, ValueKind,
};
use crate::naming::ReferenceNamer;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Prefix of every component reference
pub const COMPONENT_REF_PREFIX: &str = "#/components/schemas/";

/// Schema generator - converts type metadata to OpenAPI schemas.
///
/// One generator is one pass: the component cache lives exactly as long as the
/// generator and is never shared between passes.
pub struct SchemaGenerator<'p> {
    /// Type Metadata Provider consulted for every type
    provider: &'p dyn TypeMetadataProvider,
    namer: ReferenceNamer,
    /// Object types, in discovery order
    components: IndexMap<TypeId, CachedSchema>,
    /// Inlined (non-object) schemas, memoized per type
    inline: HashMap<TypeId, Rc<Schema>>,
    /// Inline types currently being resolved
    resolving: HashSet<TypeId>,
}

/// Cache entry for an object type
#[derive(Debug)]
struct CachedSchema {
    name: String,
    /// The `$ref` node handed out for this type
    reference: Rc<Schema>,
    /// Full schema, filled in once all members are resolved
    body: Option<Schema>,
}

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Reference to a component schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none", default)]
    pub reference: Option<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub schema_type: Option<SchemaType>,
    /// Format for primitive types (e.g., "int32", "int64", "float", "double")
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
    /// Properties for object types, in declaration order
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub properties: IndexMap<String, Schema>,
    /// Required property names for object types
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub required: Vec<String>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub items: Option<Box<Schema>>,
    /// Value schema for dictionary types
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub additional_properties: Option<Box<Schema>>,
    /// Enum values in declaration order
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty", default)]
    pub enum_values: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub one_of: Vec<Schema>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub all_of: Vec<Schema>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub discriminator: Option<Discriminator>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub read_only: bool,
    #[serde(skip_serializing_if = "is_false", default)]
    pub write_only: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pattern: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// JSON Schema `type` keyword values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Null,
    Array,
    Object,
}

impl From<ValueKind> for SchemaType {
    fn from(kind: ValueKind) -> Self {
        match kind {
            ValueKind::String => SchemaType::String,
            ValueKind::Integer => SchemaType::Integer,
            ValueKind::Number => SchemaType::Number,
            ValueKind::Boolean => SchemaType::Boolean,
            ValueKind::Null => SchemaType::Null,
        }
    }
}

/// Structural kind of a schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Primitive(ValueKind),
    Array,
    Dictionary,
    Enum,
    Object,
    Reference,
}

/// Selects among `oneOf` members by the value of one property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discriminator {
    pub property_name: String,
    /// Discriminator value -> component reference
    #[serde(skip_serializing_if = "IndexMap::is_empty", default)]
    pub mapping: IndexMap<String, String>,
}

impl Schema {
    /// A `$ref` node pointing at the named component
    pub fn reference_to(name: &str) -> Self {
        Self {
            reference: Some(format!("{}{}", COMPONENT_REF_PREFIX, name)),
            ..Self::default()
        }
    }

    pub fn of_type(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Self::default()
        }
    }

    /// Component name this node refers to, if it is a reference
    pub fn reference_name(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .and_then(|r| r.strip_prefix(COMPONENT_REF_PREFIX))
    }

    pub fn kind(&self) -> SchemaKind {
        if self.reference.is_some() {
            return SchemaKind::Reference;
        }
        if !self.enum_values.is_empty() {
            return SchemaKind::Enum;
        }
        match self.schema_type {
            Some(SchemaType::Array) => SchemaKind::Array,
            Some(SchemaType::Object) | None => {
                if self.additional_properties.is_some() && self.properties.is_empty() {
                    SchemaKind::Dictionary
                } else {
                    SchemaKind::Object
                }
            }
            Some(SchemaType::String) => SchemaKind::Primitive(ValueKind::String),
            Some(SchemaType::Integer) => SchemaKind::Primitive(ValueKind::Integer),
            Some(SchemaType::Number) => SchemaKind::Primitive(ValueKind::Number),
            Some(SchemaType::Boolean) => SchemaKind::Primitive(ValueKind::Boolean),
            Some(SchemaType::Null) => SchemaKind::Primitive(ValueKind::Null),
        }
    }

    fn apply_constraints(&mut self, constraints: &Constraints) {
        if constraints.is_empty() {
            return;
        }
        self.minimum = constraints.minimum.or(self.minimum);
        self.maximum = constraints.maximum.or(self.maximum);
        self.min_length = constraints.min_length.or(self.min_length);
        self.max_length = constraints.max_length.or(self.max_length);
        self.min_items = constraints.min_items.or(self.min_items);
        self.max_items = constraints.max_items.or(self.max_items);
        if constraints.pattern.is_some() {
            self.pattern = constraints.pattern.clone();
        }
    }
}

impl<'p> SchemaGenerator<'p> {
    /// Create a new SchemaGenerator backed by a Type Metadata Provider
    pub fn new(provider: &'p dyn TypeMetadataProvider) -> Self {
        debug!("Initializing SchemaGenerator");
        Self {
            provider,
            namer: ReferenceNamer::new(),
            components: IndexMap::new(),
            inline: HashMap::new(),
            resolving: HashSet::new(),
        }
    }

    /// Resolve a type to its schema node.
    ///
    /// Object types come back as `$ref` nodes and their bodies are stored as
    /// components; every other shape is returned inline. Repeated calls for the
    /// same type return the same node.
    pub fn resolve(&mut self, id: &TypeId) -> Result<Rc<Schema>> {
        // Aliases and wrappers share the entry of the type they stand for
        let canonical = self.provider.canonical(id);
        let id = &canonical;
        if let Some(cached) = self.components.get(id) {
            debug!("Schema for {} already exists", id);
            return Ok(Rc::clone(&cached.reference));
        }
        if let Some(cached) = self.inline.get(id) {
            return Ok(Rc::clone(cached));
        }

        debug!("Generating schema for type: {}", id);
        let shape = self
            .provider
            .describe(id)
            .ok_or_else(|| Error::UnsupportedType {
                type_id: id.clone(),
                reason: "structural kind cannot be determined".to_string(),
            })?;

        let schema = match shape {
            TypeShape::Object(object) => return self.resolve_object(id, &object),
            TypeShape::Primitive { primitive } => primitive_to_schema(primitive),
            TypeShape::Enum(shape) => enum_to_schema(&shape),
            TypeShape::Array { element } => {
                let items = self.resolve_member(id, &element)?;
                Schema {
                    items: Some(Box::new(items)),
                    ..Schema::of_type(SchemaType::Array)
                }
            }
            // Map keys are always strings in JSON, so the key type is not represented
            TypeShape::Dictionary { value, .. } => {
                let values = self.resolve_member(id, &value)?;
                Schema {
                    additional_properties: Some(Box::new(values)),
                    ..Schema::of_type(SchemaType::Object)
                }
            }
            TypeShape::FreeForm => Schema {
                additional_properties: Some(Box::new(Schema::default())),
                ..Schema::of_type(SchemaType::Object)
            },
        };

        let schema = Rc::new(schema);
        self.inline.insert(id.clone(), Rc::clone(&schema));
        Ok(schema)
    }

    /// Resolve a type and attach a default value to a copy of its node
    pub fn resolve_with_default(&mut self, id: &TypeId, default: Option<&Value>) -> Result<Schema> {
        let mut schema = (*self.resolve(id)?).clone();
        if let Some(value) = default {
            schema.default = Some(value.clone());
        }
        Ok(schema)
    }

    /// Resolve the element or value type of an inline container
    fn resolve_member(&mut self, owner: &TypeId, member: &TypeId) -> Result<Schema> {
        if !self.resolving.insert(owner.clone()) {
            return Err(Error::UnsupportedType {
                type_id: owner.clone(),
                reason: "recursive type without an object in the cycle".to_string(),
            });
        }
        let resolved = self.resolve(member);
        self.resolving.remove(owner);
        Ok((*resolved?).clone())
    }

    fn resolve_object(&mut self, id: &TypeId, object: &ObjectShape) -> Result<Rc<Schema>> {
        let name = self.namer.name_for(id, self.provider);
        debug!("Generating object schema for: {} as {}", id, name);

        // Registered before members are visited so self references terminate
        let reference = Rc::new(Schema::reference_to(&name));
        self.components.insert(
            id.clone(),
            CachedSchema {
                name,
                reference: Rc::clone(&reference),
                body: None,
            },
        );

        // The cycle now passes through an object, which always terminates it
        let outer = std::mem::take(&mut self.resolving);
        let body = self.object_to_schema(object);
        self.resolving = outer;
        let body = body?;
        if let Some(entry) = self.components.get_mut(id) {
            entry.body = Some(body);
        }
        Ok(reference)
    }

    fn object_to_schema(&mut self, object: &ObjectShape) -> Result<Schema> {
        let mut schema = Schema {
            description: object.description.clone(),
            ..Schema::of_type(SchemaType::Object)
        };

        let mut mapping = IndexMap::new();
        for subtype in &object.subtypes {
            let resolved = self.resolve(&subtype.type_id)?;
            if let (Some(tag), Some(reference)) = (&subtype.tag, &resolved.reference) {
                mapping.insert(tag.clone(), reference.clone());
            }
            schema.one_of.push((*resolved).clone());
        }
        if let Some(property_name) = &object.discriminator {
            if !object.subtypes.is_empty() {
                schema.discriminator = Some(Discriminator {
                    property_name: property_name.clone(),
                    mapping,
                });
            }
        }

        if let Some(base) = &object.base {
            let resolved = self.resolve(base)?;
            schema.all_of.push((*resolved).clone());
        }

        for property in &object.properties {
            if property.inherited {
                debug!("Skipping inherited property: {}", property.name);
                continue;
            }
            let resolved = self.resolve(&property.type_id)?;
            let node = property_to_schema(&resolved, property);
            if property.required {
                schema.required.push(property.name.clone());
            }
            schema.properties.insert(property.name.clone(), node);
        }

        Ok(schema)
    }

    /// Component schemas keyed by canonical name, in discovery order
    pub fn get_schemas(&self) -> IndexMap<String, Schema> {
        self.components
            .values()
            .filter_map(|entry| entry.body.clone().map(|body| (entry.name.clone(), body)))
            .collect()
    }

    /// Component schema by canonical name
    pub fn component(&self, name: &str) -> Option<&Schema> {
        self.components
            .values()
            .find(|entry| entry.name == name)
            .and_then(|entry| entry.body.as_ref())
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

/// Convert a primitive type to an OpenAPI schema
fn primitive_to_schema(primitive: PrimitiveType) -> Schema {
    Schema {
        format: primitive.format().map(str::to_string),
        ..Schema::of_type(primitive.value_kind().into())
    }
}

fn enum_to_schema(shape: &EnumShape) -> Schema {
    Schema {
        enum_values: shape.members.iter().map(|m| m.value.clone()).collect(),
        ..primitive_to_schema(shape.underlying)
    }
}

/// Property node: the resolved type plus per-property annotations
fn property_to_schema(resolved: &Schema, property: &PropertyDef) -> Schema {
    let mut node = resolved.clone();
    if property.default.is_some() {
        node.default = property.default.clone();
    }
    if property.description.is_some() {
        node.description = property.description.clone();
    }
    node.read_only = !property.writable;
    node.write_only = !property.readable;
    node.apply_constraints(&property.constraints);
    node
}
