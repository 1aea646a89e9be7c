use crate::metadata::{TypeId, TypeMetadataProvider, TypeShape};
use log::debug;
use std::collections::HashMap;

/// Derives canonical component names for types.
///
/// Names are deterministic for a given resolution order and injective within a
/// pass: a name already owned by a different type gets a numeric suffix.
#[derive(Debug, Default)]
pub struct ReferenceNamer {
    by_type: HashMap<TypeId, String>,
    owners: HashMap<String, TypeId>,
}

impl ReferenceNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical component name for `id`
    pub fn name_for(&mut self, id: &TypeId, provider: &dyn TypeMetadataProvider) -> String {
        if let Some(name) = self.by_type.get(id) {
            return name.clone();
        }

        let base = Self::derive_name(id, provider);
        let mut name = base.clone();
        let mut suffix = 2;
        while self.owners.get(&name).is_some_and(|owner| owner != id) {
            name = format!("{}{}", base, suffix);
            suffix += 1;
        }
        if name != base {
            debug!("Name {} already taken, using {} for {}", base, name, id);
        }

        self.owners.insert(name.clone(), id.clone());
        self.by_type.insert(id.clone(), name.clone());
        name
    }

    /// Name derivation without collision handling
    pub fn derive_name(id: &TypeId, provider: &dyn TypeMetadataProvider) -> String {
        let synthetic = matches!(
            provider.describe(id),
            Some(TypeShape::Object(ref object)) if object.synthetic
        );

        let prefix: String = id
            .args
            .iter()
            .map(|arg| Self::derive_name(arg, provider))
            .collect();

        if synthetic {
            return prefix + "AnonymousType";
        }

        prefix + &id.simple_name().replace("[]", "Array")
    }
}
