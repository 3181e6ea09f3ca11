use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::access::AccessValue;

pub type TypeId = u16;

/// Everything the builders and the router need to know about one object
/// type. Mirrors the shape of the upstream type definitions; loaded once
/// from JSON and passed around by reference, never global.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TypeInfo {
    pub name: String,
    /// Objects of this type are invisible to every pipeline.
    #[serde(default)]
    pub ignore: bool,
    /// Administrative boundary; eligible for the region tree when it carries
    /// an admin level.
    #[serde(default)]
    pub boundary: bool,
    /// Populated places (place=city and friends) become regions or aliases.
    #[serde(default)]
    pub index_as_region: bool,
    /// Named objects of this type become locations (streets) in the index.
    #[serde(default)]
    pub index_as_location: bool,
    /// Named objects of this type become POIs of their region.
    #[serde(default)]
    pub index_as_poi: bool,
    /// Junction marker on nodes (mini roundabouts, motorway junctions).
    #[serde(default)]
    pub junction_marker: bool,
    /// Access granted to ways/areas of this type that carry no explicit
    /// access value of their own.
    #[serde(default = "AccessValue::none")]
    pub default_access: AccessValue,
    /// Assumed speed in km/h when a way has no maxspeed, 0 for unknown.
    #[serde(default)]
    pub max_speed: u8,
}

impl TypeInfo {
    pub fn new(name: &str) -> TypeInfo {
        TypeInfo {
            name: name.to_string(),
            ignore: false,
            boundary: false,
            index_as_region: false,
            index_as_location: false,
            index_as_poi: false,
            junction_marker: false,
            default_access: AccessValue::none(),
            max_speed: 0,
        }
    }

    pub fn can_route(&self) -> bool {
        self.default_access.any_forward() || self.default_access.any_backward()
    }
}

/// The immutable catalog of object types. Index positions are the
/// `TypeId`s stored in the data files, so the config must match the one the
/// import preprocessor used.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TypeConfig {
    types: Vec<TypeInfo>,
}

impl TypeConfig {
    pub fn new(types: Vec<TypeInfo>) -> TypeConfig {
        TypeConfig { types }
    }

    pub fn load_json(path: &str) -> Result<TypeConfig> {
        let raw = fs_err::read_to_string(path)?;
        let types: Vec<TypeInfo> =
            serde_json::from_str(&raw).with_context(|| format!("parsing type config {}", path))?;
        Ok(TypeConfig { types })
    }

    pub fn get(&self, id: TypeId) -> &TypeInfo {
        &self.types[id as usize]
    }

    pub fn id_of(&self, name: &str) -> Option<TypeId> {
        self.types
            .iter()
            .position(|t| t.name == name)
            .map(|idx| idx as TypeId)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeInfo> {
        self.types.iter()
    }
}
