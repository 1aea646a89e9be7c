//! Type metadata recovered from Rust sources.
//!
//! Structs, enums and type aliases are read with `syn` and registered in a
//! [`TypeRegistry`] the way serde would serialize them: field renames and
//! `rename_all`, skipped fields, `Option` and `#[serde(default)]` for optional
//! members, flattened bases, tagged enums as polymorphic objects. Validation
//! bounds come from `#[validate(length(..), range(..))]` and defaults from
//! `#[schema(default = ..)]`.

use crate::metadata::{
    Constraints, EnumMember, EnumShape, ObjectShape, PrimitiveType, PropertyDef, Subtype, TypeId,
    TypeShape,
};
use crate::parser::SourceFile;
use crate::type_registry::{parse_primitive_type, TypeRegistry};
use heck::{
    ToKebabCase, ToLowerCamelCase, ToShoutyKebabCase, ToShoutySnakeCase, ToSnakeCase,
    ToUpperCamelCase,
};
use log::{debug, warn};
use quote::ToTokens;
use serde_json::{Number, Value};
use std::collections::HashSet;
use syn::ext::IdentExt;
use syn::meta::ParseNestedMeta;
use syn::punctuated::Punctuated;
use syn::{Expr, ExprLit, Fields, GenericArgument, Lit, PathArguments, Token, Type, UnOp};

/// Builds a type registry from parsed source files.
pub struct TypeLoader {
    registry: TypeRegistry,
    /// Names already defined; the first definition of a name wins
    loaded: HashSet<String>,
}

impl TypeLoader {
    pub fn load(files: &[SourceFile]) -> TypeRegistry {
        let mut loader = Self {
            registry: TypeRegistry::new(),
            loaded: HashSet::new(),
        };
        for file in files {
            debug!("Loading types from {}", file.path.display());
            loader.load_items(&file.syntax_tree.items);
        }
        debug!("Loaded {} type definition(s)", loader.registry.len());
        loader.registry
    }

    fn load_items(&mut self, items: &[syn::Item]) {
        for item in items {
            match item {
                syn::Item::Struct(item) => self.load_struct(item),
                syn::Item::Enum(item) => self.load_enum(item),
                syn::Item::Type(item) => self.load_alias(item),
                syn::Item::Mod(module) => {
                    if let Some((_, items)) = &module.content {
                        self.load_items(items);
                    }
                }
                _ => {}
            }
        }
    }

    fn claim(&mut self, name: &str) -> bool {
        if !self.loaded.insert(name.to_string()) {
            warn!("Type {} is defined more than once, keeping the first definition", name);
            return false;
        }
        true
    }

    fn register(&mut self, name: String, params: Vec<String>, shape: TypeShape) {
        if params.is_empty() {
            self.registry.register(TypeId::new(name), shape);
        } else {
            self.registry.register_generic(name, params, shape);
        }
    }

    fn load_struct(&mut self, item: &syn::ItemStruct) {
        let name = item.ident.to_string();
        if !self.claim(&name) {
            return;
        }
        debug!("Loading struct: {}", name);

        let container = ContainerAttrs::parse(&item.attrs, &name);
        let params = type_params(&item.generics);

        // Single-field wrappers serialize as the wrapped value
        let wrapped = match &item.fields {
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => Some(&fields.unnamed[0].ty),
            Fields::Named(fields) if container.transparent && fields.named.len() == 1 => {
                Some(&fields.named[0].ty)
            }
            _ => None,
        };
        if let Some(ty) = wrapped {
            if params.is_empty() {
                let (target, _) = type_id_of(ty).strip_optional();
                self.registry.register_alias(TypeId::new(name), target);
            } else {
                debug!("Generic wrapper {} is left undescribed", name);
            }
            return;
        }

        let shape = match &item.fields {
            Fields::Named(fields) => TypeShape::Object(struct_shape(
                &name,
                fields,
                &container,
                doc_comment(&item.attrs),
            )),
            Fields::Unit => TypeShape::primitive(PrimitiveType::Null),
            Fields::Unnamed(_) => {
                debug!("Tuple struct {} is left undescribed", name);
                return;
            }
        };
        self.register(name, params, shape);
    }

    fn load_enum(&mut self, item: &syn::ItemEnum) {
        let name = item.ident.to_string();
        if !self.claim(&name) {
            return;
        }
        debug!("Loading enum: {}", name);

        let container = ContainerAttrs::parse(&item.attrs, &name);
        let variants: Vec<(&syn::Variant, MemberAttrs)> = item
            .variants
            .iter()
            .map(|variant| (variant, MemberAttrs::parse(&variant.attrs, &name)))
            .filter(|(_, attrs)| !attrs.skip)
            .collect();

        let shape = if variants.iter().all(|(v, _)| matches!(v.fields, Fields::Unit)) {
            TypeShape::Enum(unit_enum_shape(&variants, &container))
        } else if let Some(object) = polymorphic_shape(&variants, &container) {
            TypeShape::Object(ObjectShape {
                description: doc_comment(&item.attrs),
                ..object
            })
        } else {
            debug!("Enum {} has data variants without a describable layout", name);
            TypeShape::Object(ObjectShape {
                description: doc_comment(&item.attrs),
                ..ObjectShape::default()
            })
        };
        self.register(name, type_params(&item.generics), shape);
    }

    fn load_alias(&mut self, item: &syn::ItemType) {
        let name = item.ident.to_string();
        if !type_params(&item.generics).is_empty() {
            debug!("Generic alias {} is left undescribed", name);
            return;
        }
        if !self.claim(&name) {
            return;
        }
        self.registry
            .register_alias(TypeId::new(name), type_id_of(&item.ty));
    }
}

fn struct_shape(
    owner: &str,
    fields: &syn::FieldsNamed,
    container: &ContainerAttrs,
    description: Option<String>,
) -> ObjectShape {
    let mut object = ObjectShape {
        description,
        ..ObjectShape::default()
    };

    for field in &fields.named {
        let Some(ident) = &field.ident else {
            continue;
        };
        let attrs = MemberAttrs::parse(&field.attrs, owner);
        if attrs.skip {
            continue;
        }

        let (type_id, optional) = type_id_of(&field.ty).strip_optional();
        if attrs.flatten {
            if object.base.is_none() {
                object.base = Some(type_id);
            } else {
                warn!(
                    "{}: only the first flattened field is composed, ignoring {}",
                    owner, ident
                );
            }
            continue;
        }

        let field_name = ident.unraw().to_string();
        let name = attrs
            .rename
            .clone()
            .or_else(|| container.rename_all.map(|rule| rule.apply(&field_name)))
            .unwrap_or(field_name);

        object.properties.push(PropertyDef {
            name,
            required: !(optional || attrs.default || attrs.skip_serializing_if || container.default),
            readable: !attrs.skip_serializing,
            writable: !attrs.skip_deserializing,
            default: attrs.schema_default.clone(),
            description: doc_comment(&field.attrs),
            constraints: attrs.constraints_for(&type_id),
            inherited: false,
            type_id,
        });
    }
    object
}

fn unit_enum_shape(variants: &[(&syn::Variant, MemberAttrs)], container: &ContainerAttrs) -> EnumShape {
    if container.serialize_repr {
        // `None` once the implicit discriminant has run past `i64::MAX`
        let mut next = Some(0i64);
        let members = variants
            .iter()
            .filter_map(|(variant, _)| {
                if let Some((_, expr)) = &variant.discriminant {
                    if let Some(value) = literal_value(expr).and_then(|v| v.as_i64()) {
                        next = Some(value);
                    }
                }
                let Some(value) = next else {
                    warn!("Discriminant of {} overflows, skipping it", variant.ident);
                    return None;
                };
                next = value.checked_add(1);
                Some(EnumMember {
                    name: variant.ident.to_string(),
                    value: Value::from(value),
                })
            })
            .collect();
        return EnumShape {
            underlying: container.repr.unwrap_or(PrimitiveType::I32),
            members,
        };
    }

    EnumShape {
        underlying: PrimitiveType::String,
        members: variants
            .iter()
            .map(|(variant, attrs)| EnumMember {
                name: variant.ident.to_string(),
                value: Value::String(variant_name(variant, attrs, container)),
            })
            .collect(),
    }
}

/// Internally tagged or untagged enums of newtype variants
fn polymorphic_shape(
    variants: &[(&syn::Variant, MemberAttrs)],
    container: &ContainerAttrs,
) -> Option<ObjectShape> {
    let internal = container.tag.is_some() && container.content.is_none();
    if !(internal || container.untagged) {
        return None;
    }

    let mut subtypes = Vec::new();
    for (variant, attrs) in variants {
        let Fields::Unnamed(fields) = &variant.fields else {
            return None;
        };
        if fields.unnamed.len() != 1 {
            return None;
        }
        let (type_id, _) = type_id_of(&fields.unnamed[0].ty).strip_optional();
        let tag = internal.then(|| variant_name(variant, attrs, container));
        subtypes.push(Subtype::new(type_id, tag));
    }

    Some(ObjectShape {
        subtypes,
        discriminator: if internal { container.tag.clone() } else { None },
        ..ObjectShape::default()
    })
}

fn variant_name(variant: &syn::Variant, attrs: &MemberAttrs, container: &ContainerAttrs) -> String {
    let ident = variant.ident.unraw().to_string();
    attrs
        .rename
        .clone()
        .or_else(|| container.rename_all.map(|rule| rule.apply(&ident)))
        .unwrap_or(ident)
}

/// Convert a syntactic type into a type identifier
pub fn type_id_of(ty: &Type) -> TypeId {
    match ty {
        Type::Path(type_path) if type_path.qself.is_none() => path_type_id(&type_path.path),
        Type::Reference(reference) => type_id_of(&reference.elem),
        Type::Array(array) => TypeId::array_of(type_id_of(&array.elem)),
        Type::Slice(slice) => TypeId::array_of(type_id_of(&slice.elem)),
        Type::Paren(paren) => type_id_of(&paren.elem),
        Type::Group(group) => type_id_of(&group.elem),
        Type::Tuple(tuple) if tuple.elems.is_empty() => TypeId::new("()"),
        // Kept verbatim; the registry cannot describe it
        other => TypeId::new(other.to_token_stream().to_string()),
    }
}

fn path_type_id(path: &syn::Path) -> TypeId {
    let segments: Vec<String> = path
        .segments
        .iter()
        .map(|segment| segment.ident.to_string())
        .filter(|segment| !matches!(segment.as_str(), "crate" | "self" | "super"))
        .collect();

    let args = match path.segments.last().map(|segment| &segment.arguments) {
        Some(PathArguments::AngleBracketed(arguments)) => arguments
            .args
            .iter()
            .filter_map(|arg| match arg {
                GenericArgument::Type(ty) => Some(type_id_of(ty)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    let id = TypeId::generic(segments.join("::"), args);
    // Smart pointers serialize as their pointee
    if matches!(id.simple_name(), "Box" | "Arc" | "Rc" | "Cow") && id.args.len() == 1 {
        return id.args.into_iter().next().unwrap_or_else(|| TypeId::new("()"));
    }
    id
}

fn type_params(generics: &syn::Generics) -> Vec<String> {
    generics
        .type_params()
        .map(|param| param.ident.to_string())
        .collect()
}

/// Joined `///` lines, `None` when there are none
fn doc_comment(attrs: &[syn::Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(s), ..
                }) => Some(s.value().trim().to_string()),
                _ => None,
            },
            _ => None,
        })
        .collect();

    let text = lines.join("\n").trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// JSON value of a literal expression such as `42`, `-1.5` or `"open"`
fn literal_value(expr: &Expr) -> Option<Value> {
    match expr {
        Expr::Lit(ExprLit { lit, .. }) => match lit {
            Lit::Str(s) => Some(Value::String(s.value())),
            Lit::Char(c) => Some(Value::String(c.value().to_string())),
            Lit::Bool(b) => Some(Value::Bool(b.value)),
            Lit::Int(i) => i.base10_parse::<i64>().ok().map(Value::from),
            Lit::Float(f) => f
                .base10_parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            _ => None,
        },
        Expr::Unary(unary) if matches!(unary.op, UnOp::Neg(_)) => {
            match literal_value(&unary.expr)? {
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Some(Value::from(-i)),
                    None => n.as_f64().and_then(|f| Number::from_f64(-f)).map(Value::Number),
                },
                _ => None,
            }
        }
        Expr::Paren(paren) => literal_value(&paren.expr),
        Expr::Group(group) => literal_value(&group.expr),
        _ => None,
    }
}

/// Serde's `rename_all` rules
#[derive(Debug, Clone, Copy, PartialEq)]
enum RenameRule {
    Lower,
    Upper,
    Pascal,
    Camel,
    Snake,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "lowercase" => Some(RenameRule::Lower),
            "UPPERCASE" => Some(RenameRule::Upper),
            "PascalCase" => Some(RenameRule::Pascal),
            "camelCase" => Some(RenameRule::Camel),
            "snake_case" => Some(RenameRule::Snake),
            "SCREAMING_SNAKE_CASE" => Some(RenameRule::ScreamingSnake),
            "kebab-case" => Some(RenameRule::Kebab),
            "SCREAMING-KEBAB-CASE" => Some(RenameRule::ScreamingKebab),
            _ => None,
        }
    }

    fn apply(self, name: &str) -> String {
        match self {
            RenameRule::Lower => name.to_lowercase(),
            RenameRule::Upper => name.to_uppercase(),
            RenameRule::Pascal => name.to_upper_camel_case(),
            RenameRule::Camel => name.to_lower_camel_case(),
            RenameRule::Snake => name.to_snake_case(),
            RenameRule::ScreamingSnake => name.to_shouty_snake_case(),
            RenameRule::Kebab => name.to_kebab_case(),
            RenameRule::ScreamingKebab => name.to_shouty_kebab_case(),
        }
    }
}

/// Attributes on a struct or enum
#[derive(Debug, Default)]
struct ContainerAttrs {
    rename_all: Option<RenameRule>,
    /// `#[serde(default)]`: every field may be absent
    default: bool,
    transparent: bool,
    tag: Option<String>,
    content: Option<String>,
    untagged: bool,
    /// Derives `Serialize_repr`
    serialize_repr: bool,
    repr: Option<PrimitiveType>,
}

impl ContainerAttrs {
    fn parse(attrs: &[syn::Attribute], owner: &str) -> Self {
        let mut container = ContainerAttrs::default();

        for_each_meta(attrs, "serde", owner, |meta| {
            if meta.path.is_ident("rename_all") {
                if let Some(rule) = renamed(&meta)? {
                    container.rename_all = RenameRule::from_name(&rule);
                    if container.rename_all.is_none() {
                        warn!("{}: unknown rename_all rule {:?}", owner, rule);
                    }
                }
            } else if meta.path.is_ident("default") {
                container.default = true;
                skip_meta(meta)?;
            } else if meta.path.is_ident("transparent") {
                container.transparent = true;
            } else if meta.path.is_ident("tag") {
                container.tag = Some(string_value(&meta)?);
            } else if meta.path.is_ident("content") {
                container.content = Some(string_value(&meta)?);
            } else if meta.path.is_ident("untagged") {
                container.untagged = true;
            } else {
                skip_meta(meta)?;
            }
            Ok(())
        });

        for attr in attrs {
            if attr.path().is_ident("derive") {
                let derives = attr.parse_args_with(Punctuated::<syn::Path, Token![,]>::parse_terminated);
                if let Ok(derives) = derives {
                    container.serialize_repr |= derives.iter().any(|path| {
                        path.segments
                            .last()
                            .is_some_and(|segment| segment.ident == "Serialize_repr")
                    });
                }
            } else if attr.path().is_ident("repr") {
                if let Ok(ident) = attr.parse_args::<syn::Ident>() {
                    container.repr = parse_primitive_type(&ident.to_string());
                }
            }
        }

        container
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Bounds {
    min: Option<f64>,
    max: Option<f64>,
}

/// Attributes on a field or enum variant
#[derive(Debug, Default)]
struct MemberAttrs {
    rename: Option<String>,
    skip: bool,
    skip_serializing: bool,
    skip_deserializing: bool,
    skip_serializing_if: bool,
    default: bool,
    flatten: bool,
    schema_default: Option<Value>,
    pattern: Option<String>,
    length: Bounds,
    range: Bounds,
}

impl MemberAttrs {
    fn parse(attrs: &[syn::Attribute], owner: &str) -> Self {
        let mut member = MemberAttrs::default();

        for_each_meta(attrs, "serde", owner, |meta| {
            if meta.path.is_ident("rename") {
                member.rename = renamed(&meta)?;
            } else if meta.path.is_ident("skip") {
                member.skip = true;
            } else if meta.path.is_ident("skip_serializing") {
                member.skip_serializing = true;
            } else if meta.path.is_ident("skip_deserializing") {
                member.skip_deserializing = true;
            } else if meta.path.is_ident("skip_serializing_if") {
                member.skip_serializing_if = true;
                skip_meta(meta)?;
            } else if meta.path.is_ident("default") {
                member.default = true;
                skip_meta(meta)?;
            } else if meta.path.is_ident("flatten") {
                member.flatten = true;
            } else {
                skip_meta(meta)?;
            }
            Ok(())
        });

        for_each_meta(attrs, "schema", owner, |meta| {
            if meta.path.is_ident("default") {
                let expr: Expr = meta.value()?.parse()?;
                member.schema_default = literal_value(&expr);
                if member.schema_default.is_none() {
                    warn!("{}: schema default must be a literal", owner);
                }
            } else if meta.path.is_ident("pattern") {
                member.pattern = Some(string_value(&meta)?);
            } else {
                skip_meta(meta)?;
            }
            Ok(())
        });

        for_each_meta(attrs, "validate", owner, |meta| {
            if meta.path.is_ident("length") {
                meta.parse_nested_meta(|inner| parse_bound(&inner, &mut member.length))?;
            } else if meta.path.is_ident("range") {
                meta.parse_nested_meta(|inner| parse_bound(&inner, &mut member.range))?;
            } else {
                skip_meta(meta)?;
            }
            Ok(())
        });

        member
    }

    fn constraints_for(&self, type_id: &TypeId) -> Constraints {
        let to_count = |bound: Option<f64>| bound.map(|value| value as u64);
        let mut constraints = Constraints {
            minimum: self.range.min,
            maximum: self.range.max,
            pattern: self.pattern.clone(),
            ..Constraints::default()
        };
        if is_sequence(type_id) {
            constraints.min_items = to_count(self.length.min);
            constraints.max_items = to_count(self.length.max);
        } else {
            constraints.min_length = to_count(self.length.min);
            constraints.max_length = to_count(self.length.max);
        }
        constraints
    }
}

fn is_sequence(type_id: &TypeId) -> bool {
    type_id.is_array()
        || matches!(
            type_id.simple_name(),
            "Vec" | "VecDeque" | "LinkedList" | "HashSet" | "BTreeSet" | "IndexSet"
        )
}

/// Run `handle` over the nested metas of every `#[name(..)]` attribute
fn for_each_meta<F>(attrs: &[syn::Attribute], name: &str, owner: &str, mut handle: F)
where
    F: FnMut(ParseNestedMeta) -> syn::Result<()>,
{
    for attr in attrs.iter().filter(|attr| attr.path().is_ident(name)) {
        if let Err(e) = attr.parse_nested_meta(&mut handle) {
            warn!("Ignoring malformed #[{}] attribute on {}: {}", name, owner, e);
        }
    }
}

/// Consume a meta item without interpreting it
fn skip_meta(meta: ParseNestedMeta) -> syn::Result<()> {
    if meta.input.peek(Token![=]) {
        meta.value()?.parse::<Expr>()?;
    } else if meta.input.peek(syn::token::Paren) {
        meta.parse_nested_meta(skip_meta)?;
    }
    Ok(())
}

fn string_value(meta: &ParseNestedMeta) -> syn::Result<String> {
    let lit: syn::LitStr = meta.value()?.parse()?;
    Ok(lit.value())
}

/// `name = ".."` or `name(serialize = "..")`
fn renamed(meta: &ParseNestedMeta) -> syn::Result<Option<String>> {
    if meta.input.peek(Token![=]) {
        return string_value(meta).map(Some);
    }
    let mut serialized = None;
    meta.parse_nested_meta(|inner| {
        if inner.path.is_ident("serialize") {
            serialized = Some(string_value(&inner)?);
        } else {
            skip_meta(inner)?;
        }
        Ok(())
    })?;
    Ok(serialized)
}

fn parse_bound(meta: &ParseNestedMeta, bounds: &mut Bounds) -> syn::Result<()> {
    let expr: Expr = meta.value()?.parse()?;
    let value = literal_value(&expr).and_then(|v| v.as_f64());
    if meta.path.is_ident("min") {
        bounds.min = value;
    } else if meta.path.is_ident("max") {
        bounds.max = value;
    } else if meta.path.is_ident("equal") {
        bounds.min = value;
        bounds.max = value;
    }
    Ok(())
}
