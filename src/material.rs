use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Index of a [`Material`] registered with a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialHandle(pub(crate) u32);

/// Named surface properties.
///
/// When both sides of a contact define `friction` (or `restitution`), the
/// product of the two is used instead of the contact material table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub friction: Option<f64>,
    pub restitution: Option<f64>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = Some(friction);
        self
    }

    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = Some(restitution);
        self
    }
}

/// Solver parameters for contacts between two materials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactParams {
    pub friction: f64,
    pub restitution: f64,
    pub contact_equation_stiffness: f64,
    pub contact_equation_relaxation: f64,
    pub friction_equation_stiffness: f64,
    pub friction_equation_relaxation: f64,
}

impl Default for ContactParams {
    fn default() -> Self {
        Self {
            friction: 0.3,
            restitution: 0.0,
            contact_equation_stiffness: 1e7,
            contact_equation_relaxation: 3.0,
            friction_equation_stiffness: 1e7,
            friction_equation_relaxation: 3.0,
        }
    }
}

/// Contact parameters bound to an unordered pair of materials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactMaterial {
    pub materials: (MaterialHandle, MaterialHandle),
    pub params: ContactParams,
}

impl ContactMaterial {
    pub fn new(a: MaterialHandle, b: MaterialHandle, params: ContactParams) -> Self {
        Self {
            materials: (a, b),
            params,
        }
    }
}

/// Pair-keyed contact materials; `get(a, b)` and `get(b, a)` agree.
#[derive(Debug, Clone, Default)]
pub struct ContactMaterialTable {
    entries: HashMap<(MaterialHandle, MaterialHandle), ContactMaterial>,
}

impl ContactMaterialTable {
    fn key(a: MaterialHandle, b: MaterialHandle) -> (MaterialHandle, MaterialHandle) {
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Inserts or replaces the entry for the material pair.
    pub fn insert(&mut self, contact_material: ContactMaterial) -> Option<ContactMaterial> {
        let (a, b) = contact_material.materials;
        self.entries.insert(Self::key(a, b), contact_material)
    }

    pub fn get(&self, a: MaterialHandle, b: MaterialHandle) -> Option<&ContactMaterial> {
        self.entries.get(&Self::key(a, b))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
