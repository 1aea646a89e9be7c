use crate::metadata::{
    ObjectShape, PrimitiveType, PropertyDef, Subtype, TypeId, TypeMetadataProvider, TypeShape,
};
use log::debug;
use std::collections::{HashMap, HashSet};

/// In-memory Type Metadata Provider.
///
/// Explicitly registered shapes take precedence; anything else is classified by
/// name (standard primitives, collections and maps). Unknown nominal types
/// degrade to an empty object.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    /// Shapes registered for a concrete type identifier
    shapes: HashMap<TypeId, TypeShape>,
    /// Generic definitions keyed by path, instantiated on lookup
    templates: HashMap<String, GenericTemplate>,
    /// Type aliases and transparent newtypes
    aliases: HashMap<TypeId, TypeId>,
}

#[derive(Debug, Clone)]
struct GenericTemplate {
    params: Vec<String>,
    shape: TypeShape,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the shape of a concrete type, replacing any previous entry
    pub fn register(&mut self, id: TypeId, shape: TypeShape) {
        debug!("Registering type: {}", id);
        self.aliases.remove(&id);
        self.shapes.insert(id, shape);
    }

    /// Register a generic definition whose shape mentions its type parameters by name
    pub fn register_generic(&mut self, path: impl Into<String>, params: Vec<String>, shape: TypeShape) {
        let path = path.into();
        debug!("Registering generic type: {}<{}>", path, params.join(", "));
        self.templates.insert(path, GenericTemplate { params, shape });
    }

    /// Describe `id` exactly as `target` is described
    pub fn register_alias(&mut self, id: TypeId, target: TypeId) {
        debug!("Registering alias: {} = {}", id, target);
        self.shapes.remove(&id);
        self.aliases.insert(id, target);
    }

    pub fn contains(&self, id: &TypeId) -> bool {
        self.shapes.contains_key(id)
            || self.aliases.contains_key(id)
            || self.templates.contains_key(&id.path)
    }

    pub fn len(&self) -> usize {
        self.shapes.len() + self.templates.len() + self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Merge another registry into this one; entries from `other` win
    pub fn extend(&mut self, other: TypeRegistry) {
        self.shapes.extend(other.shapes);
        self.templates.extend(other.templates);
        self.aliases.extend(other.aliases);
    }

    fn alias_of(&self, id: &TypeId) -> Option<&TypeId> {
        self.aliases.get(id).or_else(|| {
            let simple = TypeId {
                path: id.simple_name().to_string(),
                args: id.args.clone(),
            };
            self.aliases.get(&simple)
        })
    }

    /// Follow aliases to the aliased type; `None` on an alias cycle
    fn unalias(&self, id: &TypeId) -> Option<TypeId> {
        let mut current = id.clone();
        let mut hops = 0;
        while let Some(target) = self.alias_of(&current) {
            hops += 1;
            if hops > self.aliases.len() {
                debug!("Alias cycle through {}", id);
                return None;
            }
            current = target.clone();
        }
        Some(current)
    }

    fn lookup_registered(&self, id: &TypeId) -> Option<TypeShape> {
        if let Some(shape) = self.shapes.get(id) {
            return Some(shape.clone());
        }

        let simple = TypeId {
            path: id.simple_name().to_string(),
            args: id.args.clone(),
        };
        if simple != *id {
            if let Some(shape) = self.shapes.get(&simple) {
                return Some(shape.clone());
            }
        }

        if id.is_generic() {
            let template = self
                .templates
                .get(&id.path)
                .or_else(|| self.templates.get(id.simple_name()))?;
            if template.params.len() == id.args.len() {
                return Some(substitute_shape(&template.shape, &template.params, &id.args));
            }
            debug!(
                "Generic {} expects {} argument(s), got {}",
                id.path,
                template.params.len(),
                id.args.len()
            );
        }

        None
    }

    /// Strip aliases and wrappers from the head, then canonicalize the arguments.
    /// `visiting` holds the heads whose arguments are being rewritten.
    fn canonical_with(&self, id: &TypeId, visiting: &mut HashSet<TypeId>) -> TypeId {
        let mut seen = HashSet::new();
        let mut head = id.clone();
        loop {
            if !seen.insert(head.clone()) {
                debug!("Alias cycle through {}", id);
                return id.clone();
            }
            if let Some(target) = self.alias_of(&head) {
                head = target.clone();
                continue;
            }
            if self.shapes.contains_key(&head) {
                break;
            }
            match transparent_inner(&head) {
                Some(inner) => head = inner.clone(),
                None => break,
            }
        }

        if head.args.is_empty() || !visiting.insert(head.clone()) {
            return head;
        }
        let args = head
            .args
            .iter()
            .map(|arg| self.canonical_with(arg, visiting))
            .collect();
        visiting.remove(&head);
        TypeId {
            path: head.path,
            args,
        }
    }

    fn describe_builtin(&self, id: &TypeId) -> Option<TypeShape> {
        if id.is_array() {
            return Some(TypeShape::Array {
                element: id.args[0].clone(),
            });
        }

        let name = id.simple_name();
        match id.args.len() {
            0 => parse_primitive_type(name)
                .map(TypeShape::primitive)
                .or_else(|| match name {
                    "Value" | "JsonValue" => Some(TypeShape::FreeForm),
                    _ => None,
                }),
            1 => match name {
                "Vec" | "VecDeque" | "LinkedList" | "HashSet" | "BTreeSet" | "IndexSet" => {
                    Some(TypeShape::Array {
                        element: id.args[0].clone(),
                    })
                }
                _ => transparent_inner(id).and_then(|inner| self.describe(inner)),
            },
            2 => match name {
                "HashMap" | "BTreeMap" | "IndexMap" => Some(TypeShape::Dictionary {
                    key: id.args[0].clone(),
                    value: id.args[1].clone(),
                }),
                _ => None,
            },
            _ => None,
        }
    }
}

impl TypeMetadataProvider for TypeRegistry {
    fn describe(&self, id: &TypeId) -> Option<TypeShape> {
        let id = &self.unalias(id)?;
        if let Some(shape) = self.lookup_registered(id) {
            return Some(shape);
        }

        if let Some(shape) = self.describe_builtin(id) {
            return Some(shape);
        }

        if !is_nominal(&id.path) {
            debug!("Type {} is not a nominal type", id);
            return None;
        }

        debug!("Unknown type: {}, using empty object", id);
        Some(TypeShape::empty_object())
    }

    fn canonical(&self, id: &TypeId) -> TypeId {
        self.canonical_with(id, &mut HashSet::new())
    }
}

/// Inner type of a wrapper that serializes as its content
fn transparent_inner(id: &TypeId) -> Option<&TypeId> {
    match (id.simple_name(), id.args.as_slice()) {
        ("Box" | "Arc" | "Rc" | "Cow" | "Option", [inner]) => Some(inner),
        _ => None,
    }
}

/// Map a primitive type name to its primitive kind
pub fn parse_primitive_type(type_name: &str) -> Option<PrimitiveType> {
    match type_name {
        "String" | "str" => Some(PrimitiveType::String),
        "char" => Some(PrimitiveType::Char),
        "bool" => Some(PrimitiveType::Bool),
        "i8" => Some(PrimitiveType::I8),
        "i16" => Some(PrimitiveType::I16),
        "i32" => Some(PrimitiveType::I32),
        "i64" => Some(PrimitiveType::I64),
        "i128" => Some(PrimitiveType::I128),
        "isize" => Some(PrimitiveType::Isize),
        "u8" => Some(PrimitiveType::U8),
        "u16" => Some(PrimitiveType::U16),
        "u32" => Some(PrimitiveType::U32),
        "u64" => Some(PrimitiveType::U64),
        "u128" => Some(PrimitiveType::U128),
        "usize" => Some(PrimitiveType::Usize),
        "f32" => Some(PrimitiveType::F32),
        "f64" => Some(PrimitiveType::F64),
        "Uuid" => Some(PrimitiveType::Uuid),
        "DateTime" | "NaiveDateTime" | "OffsetDateTime" | "SystemTime" => {
            Some(PrimitiveType::DateTime)
        }
        "NaiveDate" | "Date" => Some(PrimitiveType::Date),
        "()" => Some(PrimitiveType::Null),
        _ => None,
    }
}

/// Plain (optionally qualified) identifiers; rules out `dyn Trait`, `fn(..)`,
/// references, pointers and tuples.
fn is_nominal(path: &str) -> bool {
    !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '.' | '`'))
}

fn substitute_shape(shape: &TypeShape, params: &[String], args: &[TypeId]) -> TypeShape {
    let sub = |id: &TypeId| id.substitute(params, args);
    match shape {
        TypeShape::Array { element } => TypeShape::Array {
            element: sub(element),
        },
        TypeShape::Dictionary { key, value } => TypeShape::Dictionary {
            key: sub(key),
            value: sub(value),
        },
        TypeShape::Object(object) => TypeShape::Object(ObjectShape {
            properties: object
                .properties
                .iter()
                .map(|property| PropertyDef {
                    type_id: sub(&property.type_id),
                    ..property.clone()
                })
                .collect(),
            base: object.base.as_ref().map(sub),
            subtypes: object
                .subtypes
                .iter()
                .map(|subtype| Subtype::new(sub(&subtype.type_id), subtype.tag.clone()))
                .collect(),
            ..object.clone()
        }),
        other => other.clone(),
    }
}
