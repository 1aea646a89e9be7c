//! Type metadata model shared by every Type Metadata Provider.
//!
//! A provider answers one question: given a [`TypeId`], what is the structural
//! [`TypeShape`] of that type? The schema generator only ever branches on the
//! closed set of shapes defined here, never on type names.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Opaque, stable key for a structural type.
///
/// A type is identified by its (possibly qualified) path plus the identifiers of
/// its generic arguments. Arrays written as `T[]` are represented with the path
/// `[]` and a single argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeId {
    /// Type path, e.g. `Todo`, `models::Todo` or `HashMap`
    pub path: String,
    /// Generic arguments in declaration order
    pub args: Vec<TypeId>,
}

const ARRAY_PATH: &str = "[]";

impl TypeId {
    /// Create an identifier for a non-generic type
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }

    /// Create an identifier for a generic instantiation
    pub fn generic(path: impl Into<String>, args: Vec<TypeId>) -> Self {
        Self {
            path: path.into(),
            args,
        }
    }

    /// Create an identifier for `T[]`
    pub fn array_of(element: TypeId) -> Self {
        Self::generic(ARRAY_PATH, vec![element])
    }

    pub fn is_array(&self) -> bool {
        self.path == ARRAY_PATH && self.args.len() == 1
    }

    pub fn is_generic(&self) -> bool {
        !self.args.is_empty()
    }

    /// Last path segment with generic arity markers (`` `1 ``) removed.
    pub fn simple_name(&self) -> &str {
        let last = self.path.rsplit("::").next().unwrap_or(&self.path);
        let last = last.rsplit('.').next().unwrap_or(last);
        last.split('`').next().unwrap_or(last)
    }

    pub fn is_option(&self) -> bool {
        self.simple_name() == "Option" && self.args.len() == 1
    }

    /// Unwrap every `Option<T>` layer, reporting whether any was present.
    pub fn strip_optional(self) -> (TypeId, bool) {
        let mut current = self;
        let mut optional = false;
        while current.is_option() {
            optional = true;
            let mut args = current.args;
            current = args.swap_remove(0);
        }
        (current, optional)
    }

    /// Replace every bare occurrence of a type parameter with its argument.
    pub fn substitute(&self, params: &[String], args: &[TypeId]) -> TypeId {
        if self.args.is_empty() {
            if let Some(index) = params.iter().position(|p| *p == self.path) {
                if let Some(arg) = args.get(index) {
                    return arg.clone();
                }
            }
        }
        TypeId {
            path: self.path.clone(),
            args: self
                .args
                .iter()
                .map(|arg| arg.substitute(params, args))
                .collect(),
        }
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_array() {
            return write!(f, "{}[]", self.args[0]);
        }
        write!(f, "{}", self.path)?;
        if !self.args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

impl FromStr for TypeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, rest) = parse_type_id(s)?;
        if !rest.trim().is_empty() {
            return Err(format!("unexpected trailing input `{}` in `{}`", rest.trim(), s));
        }
        Ok(id)
    }
}

fn parse_type_id(input: &str) -> Result<(TypeId, &str), String> {
    let input = input.trim_start();
    let end = input
        .find(|c: char| matches!(c, '<' | '>' | ',' | '['))
        .unwrap_or(input.len());
    let path = input[..end].trim();
    if path.is_empty() {
        return Err(format!("expected a type name at `{}`", input));
    }

    let mut id = TypeId::new(path);
    let mut rest = &input[end..];

    if let Some(after) = rest.strip_prefix('<') {
        let mut remaining = after;
        loop {
            let (arg, tail) = parse_type_id(remaining)?;
            id.args.push(arg);
            let tail = tail.trim_start();
            if let Some(next) = tail.strip_prefix(',') {
                remaining = next;
            } else if let Some(next) = tail.strip_prefix('>') {
                rest = next;
                break;
            } else {
                return Err(format!("unterminated generic arguments in `{}`", input));
            }
        }
    }

    while let Some(next) = rest.trim_start().strip_prefix("[]") {
        id = TypeId::array_of(id);
        rest = next;
    }

    Ok((id, rest))
}

impl TryFrom<String> for TypeId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TypeId> for String {
    fn from(id: TypeId) -> Self {
        id.to_string()
    }
}

/// The primitive JSON value kinds a leaf schema can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

/// Leaf types understood by the schema generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    #[serde(alias = "str")]
    String,
    Char,
    #[serde(alias = "boolean")]
    Bool,
    I8,
    I16,
    #[serde(alias = "integer")]
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    #[serde(alias = "number")]
    F64,
    Uuid,
    #[serde(alias = "date-time")]
    DateTime,
    Date,
    Null,
}

impl PrimitiveType {
    pub fn value_kind(&self) -> ValueKind {
        match self {
            PrimitiveType::String
            | PrimitiveType::Char
            | PrimitiveType::Uuid
            | PrimitiveType::DateTime
            | PrimitiveType::Date => ValueKind::String,
            PrimitiveType::Bool => ValueKind::Boolean,
            PrimitiveType::F32 | PrimitiveType::F64 => ValueKind::Number,
            PrimitiveType::Null => ValueKind::Null,
            _ => ValueKind::Integer,
        }
    }

    pub fn format(&self) -> Option<&'static str> {
        match self {
            PrimitiveType::I8
            | PrimitiveType::I16
            | PrimitiveType::I32
            | PrimitiveType::U8
            | PrimitiveType::U16
            | PrimitiveType::U32 => Some("int32"),
            PrimitiveType::I64
            | PrimitiveType::I128
            | PrimitiveType::Isize
            | PrimitiveType::U64
            | PrimitiveType::U128
            | PrimitiveType::Usize => Some("int64"),
            PrimitiveType::F32 => Some("float"),
            PrimitiveType::F64 => Some("double"),
            PrimitiveType::Uuid => Some("uuid"),
            PrimitiveType::DateTime => Some("date-time"),
            PrimitiveType::Date => Some("date"),
            _ => None,
        }
    }
}

/// Structural kind of a type, as reported by a [`TypeMetadataProvider`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeShape {
    Primitive {
        #[serde(rename = "type")]
        primitive: PrimitiveType,
    },
    Array {
        element: TypeId,
    },
    Dictionary {
        key: TypeId,
        value: TypeId,
    },
    Enum(EnumShape),
    Object(ObjectShape),
    /// Arbitrary JSON value
    FreeForm,
}

impl TypeShape {
    pub fn primitive(primitive: PrimitiveType) -> Self {
        TypeShape::Primitive { primitive }
    }

    /// Object shape with no declared members
    pub fn empty_object() -> Self {
        TypeShape::Object(ObjectShape::default())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnumShape {
    #[serde(default = "default_enum_underlying")]
    pub underlying: PrimitiveType,
    pub members: Vec<EnumMember>,
}

fn default_enum_underlying() -> PrimitiveType {
    PrimitiveType::String
}

impl EnumShape {
    /// String enum whose serialized values are the member names
    pub fn strings<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            underlying: PrimitiveType::String,
            members: names.into_iter().map(EnumMember::named).collect(),
        }
    }
}

/// One declared enumeration member and the value it serializes to
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "EnumMemberRepr")]
pub struct EnumMember {
    pub name: String,
    pub value: Value,
}

impl EnumMember {
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            value: Value::String(name.clone()),
            name,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EnumMemberRepr {
    Name(String),
    Full { name: String, value: Value },
}

impl From<EnumMemberRepr> for EnumMember {
    fn from(repr: EnumMemberRepr) -> Self {
        match repr {
            EnumMemberRepr::Name(name) => EnumMember::named(name),
            EnumMemberRepr::Full { name, value } => EnumMember { name, value },
        }
    }
}

/// Object type: declared properties, optional base type and polymorphic subtypes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ObjectShape {
    /// Properties in declaration order, including inherited ones flagged as such
    pub properties: Vec<PropertyDef>,
    /// Declared base type, composed through `allOf`
    pub base: Option<TypeId>,
    /// Known subtypes, composed through `oneOf`
    pub subtypes: Vec<Subtype>,
    /// Property that selects among `subtypes` at runtime
    pub discriminator: Option<String>,
    /// Compiler-synthesized type without a stable declared name
    pub synthetic: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Subtype {
    #[serde(rename = "type")]
    pub type_id: TypeId,
    /// Discriminator value selecting this subtype
    #[serde(default)]
    pub tag: Option<String>,
}

impl Subtype {
    pub fn new(type_id: TypeId, tag: Option<String>) -> Self {
        Self { type_id, tag }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: TypeId,
    /// Declared on a base type rather than on the owning type
    #[serde(default)]
    pub inherited: bool,
    #[serde(default = "default_true")]
    pub required: bool,
    /// A getter exists
    #[serde(default = "default_true")]
    pub readable: bool,
    /// A setter exists
    #[serde(default = "default_true")]
    pub writable: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub constraints: Constraints,
}

fn default_true() -> bool {
    true
}

impl PropertyDef {
    /// Required, readable and writable property declared on its owner
    pub fn new(name: impl Into<String>, type_id: TypeId) -> Self {
        Self {
            name: name.into(),
            type_id,
            inherited: false,
            required: true,
            readable: true,
            writable: true,
            default: None,
            description: None,
            constraints: Constraints::default(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn inherited(mut self) -> Self {
        self.inherited = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Validation bounds. Absent bounds are omitted from the schema, never zeroed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Constraints {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub pattern: Option<String>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        *self == Constraints::default()
    }
}

/// Source of structural type information.
pub trait TypeMetadataProvider {
    /// Describe the shape of `id`, or `None` when its kind cannot be determined.
    fn describe(&self, id: &TypeId) -> Option<TypeShape>;

    /// The identifier `id` stands for once aliases, newtypes and transparent
    /// wrappers are seen through. Types with the same canonical id share one
    /// schema.
    fn canonical(&self, id: &TypeId) -> TypeId {
        id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_type_id() {
        let id: TypeId = "Todo".parse().unwrap();
        assert_eq!(id, TypeId::new("Todo"));
        assert!(!id.is_generic());
    }

    #[test]
    fn test_parse_nested_generic_type_id() {
        let id: TypeId = "HashMap<String, Vec<models::Todo>>".parse().unwrap();
        assert_eq!(id.path, "HashMap");
        assert_eq!(id.args.len(), 2);
        assert_eq!(id.args[1].path, "Vec");
        assert_eq!(id.args[1].args[0].simple_name(), "Todo");
        assert_eq!(id.to_string(), "HashMap<String, Vec<models::Todo>>");
    }

    #[test]
    fn test_parse_array_suffix() {
        let id: TypeId = "Todo[][]".parse().unwrap();
        assert!(id.is_array());
        assert!(id.args[0].is_array());
        assert_eq!(id.to_string(), "Todo[][]");
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!("Vec<Todo".parse::<TypeId>().is_err());
        assert!("".parse::<TypeId>().is_err());
        assert!("Todo> x".parse::<TypeId>().is_err());
    }

    #[test]
    fn test_simple_name_strips_qualifiers_and_arity() {
        assert_eq!(TypeId::new("crate::models::Todo").simple_name(), "Todo");
        assert_eq!(TypeId::new("System.Collections.List`1").simple_name(), "List");
    }

    #[test]
    fn test_strip_optional() {
        let id: TypeId = "Option<Option<i32>>".parse().unwrap();
        let (inner, optional) = id.strip_optional();
        assert!(optional);
        assert_eq!(inner, TypeId::new("i32"));

        let (same, optional) = TypeId::new("i32").strip_optional();
        assert!(!optional);
        assert_eq!(same, TypeId::new("i32"));
    }

    #[test]
    fn test_substitute_type_parameters() {
        let template: TypeId = "Vec<T>".parse().unwrap();
        let result = template.substitute(&["T".to_string()], &[TypeId::new("Todo")]);
        assert_eq!(result.to_string(), "Vec<Todo>");
    }

    #[test]
    fn test_primitive_formats() {
        assert_eq!(PrimitiveType::I32.value_kind(), ValueKind::Integer);
        assert_eq!(PrimitiveType::I32.format(), Some("int32"));
        assert_eq!(PrimitiveType::U64.format(), Some("int64"));
        assert_eq!(PrimitiveType::F64.value_kind(), ValueKind::Number);
        assert_eq!(PrimitiveType::Uuid.value_kind(), ValueKind::String);
        assert_eq!(PrimitiveType::String.format(), None);
    }

    #[test]
    fn test_deserialize_object_shape() {
        let yaml = r#"
kind: object
discriminator: kind
properties:
  - name: color
    type: String
  - name: sides
    type: i32
    required: false
subtypes:
  - type: Triangle
    tag: triangle
"#;
        let shape: TypeShape = serde_yaml::from_str(yaml).unwrap();
        match shape {
            TypeShape::Object(object) => {
                assert_eq!(object.properties.len(), 2);
                assert!(object.properties[0].required);
                assert!(!object.properties[1].required);
                assert_eq!(object.subtypes[0].tag.as_deref(), Some("triangle"));
                assert_eq!(object.discriminator.as_deref(), Some("kind"));
            }
            other => panic!("expected object shape, got {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_enum_members() {
        let yaml = r#"
kind: enum
underlying: i32
members:
  - name: Low
    value: 1
  - High
"#;
        let shape: TypeShape = serde_yaml::from_str(yaml).unwrap();
        match shape {
            TypeShape::Enum(shape) => {
                assert_eq!(shape.underlying, PrimitiveType::I32);
                assert_eq!(shape.members[0].value, serde_json::json!(1));
                assert_eq!(shape.members[1].value, serde_json::json!("High"));
            }
            other => panic!("expected enum shape, got {:?}", other),
        }
    }
}
