//! Structural scene elements.
//!
//! An [`Element`] row belongs to exactly one branch. Forking a branch copies
//! its rows into new rows with fresh ids; the copies keep the original
//! [`LineageId`] and remember the content they were copied from in
//! `base_fingerprint`, which is what diff and merge correlate on.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};
use crate::fingerprint::Fingerprint;
use crate::geometry::{polygon_area, Dimensions3D, Point2D, Point3D, Rotation3D};
use crate::ids::{BranchId, ElementId, LineageId, SceneId};

/// Kind of structural element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementType {
    Wall,
    Room,
    Door,
    Window,
    Furniture,
    Fixture,
    Decor,
}

impl ElementType {
    /// All element types, in declaration order.
    pub const ALL: [ElementType; 7] = [
        Self::Wall,
        Self::Room,
        Self::Door,
        Self::Window,
        Self::Furniture,
        Self::Fixture,
        Self::Decor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wall => "WALL",
            Self::Room => "ROOM",
            Self::Door => "DOOR",
            Self::Window => "WINDOW",
            Self::Furniture => "FURNITURE",
            Self::Fixture => "FIXTURE",
            Self::Decor => "DECOR",
        }
    }

    /// Whether elements of this type are part of the building shell rather
    /// than movable content.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Wall | Self::Room | Self::Door | Self::Window)
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == upper)
            .ok_or_else(|| TypeError::UnknownElementType(s.to_string()))
    }
}

/// Type-specific element attributes.
///
/// Fields irrelevant to an element's type keep their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementProperties {
    // Wall
    pub is_load_bearing: bool,
    pub thickness: f64,
    pub material: String,
    pub start_point: Option<Point2D>,
    pub end_point: Option<Point2D>,

    // Room
    pub room_type: String,
    pub area: f64,
    pub is_wet_zone: bool,
    pub boundary: Vec<Point2D>,

    // Door / window
    pub opening_type: String,
    pub wall_id: Option<ElementId>,
    pub wall_offset: f64,

    // Furniture
    pub catalog_id: String,
    pub model_url: String,
    pub brand: String,
    pub price: f64,

    // Common
    pub color: String,
    pub texture_url: String,
    pub custom_data: BTreeMap<String, String>,
}

/// Mutable content field of an element, as reported by diffs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementField {
    Type,
    Name,
    Position,
    Rotation,
    Dimensions,
    Properties,
}

impl fmt::Display for ElementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Type => "type",
            Self::Name => "name",
            Self::Position => "position",
            Self::Rotation => "rotation",
            Self::Dimensions => "dimensions",
            Self::Properties => "properties",
        };
        f.write_str(s)
    }
}

/// A structural element stored in one branch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub scene_id: SceneId,
    pub branch_id: BranchId,
    pub lineage_id: LineageId,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub name: String,
    pub position: Point3D,
    pub rotation: Rotation3D,
    pub dimensions: Dimensions3D,
    pub properties: ElementProperties,
    pub parent_id: Option<ElementId>,
    /// Starts at 1; incremented by exactly one on every successful update.
    pub version: u64,
    pub is_deleted: bool,
    /// Content fingerprint of the ancestor this row was copied from.
    pub base_fingerprint: Option<Fingerprint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Borrowed view over the fields that make up an element's content.
#[derive(Serialize)]
struct ContentView<'a> {
    element_type: ElementType,
    name: &'a str,
    position: &'a Point3D,
    rotation: &'a Rotation3D,
    dimensions: &'a Dimensions3D,
    properties: &'a ElementProperties,
}

impl Element {
    /// Create a fresh element with a new id and lineage, version 1.
    pub fn new(
        scene_id: SceneId,
        branch_id: BranchId,
        element_type: ElementType,
        name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ElementId::new(),
            scene_id,
            branch_id,
            lineage_id: LineageId::new(),
            element_type,
            name: name.into(),
            position: Point3D::default(),
            rotation: Rotation3D::default(),
            dimensions: Dimensions3D::default(),
            properties: ElementProperties::default(),
            parent_id: None,
            version: 1,
            is_deleted: false,
            base_fingerprint: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A wall running from `start` to `end`.
    pub fn wall(
        scene_id: SceneId,
        branch_id: BranchId,
        name: impl Into<String>,
        start: Point2D,
        end: Point2D,
        thickness: f64,
        is_load_bearing: bool,
    ) -> Self {
        let mut wall = Self::new(scene_id, branch_id, ElementType::Wall, name);
        wall.dimensions.width = start.distance_to(&end);
        wall.dimensions.depth = thickness;
        wall.properties = ElementProperties {
            start_point: Some(start),
            end_point: Some(end),
            thickness,
            is_load_bearing,
            ..Default::default()
        };
        wall
    }

    /// A room bounded by a closed polygon. The area is derived from the
    /// boundary.
    pub fn room(
        scene_id: SceneId,
        branch_id: BranchId,
        name: impl Into<String>,
        room_type: impl Into<String>,
        boundary: Vec<Point2D>,
        is_wet_zone: bool,
    ) -> Self {
        let mut room = Self::new(scene_id, branch_id, ElementType::Room, name);
        room.properties = ElementProperties {
            room_type: room_type.into(),
            area: polygon_area(&boundary),
            boundary,
            is_wet_zone,
            ..Default::default()
        };
        room
    }

    /// A catalog furniture item placed in the scene.
    pub fn furniture(
        scene_id: SceneId,
        branch_id: BranchId,
        name: impl Into<String>,
        catalog_id: impl Into<String>,
        position: Point3D,
        dimensions: Dimensions3D,
    ) -> Self {
        let mut furniture = Self::new(scene_id, branch_id, ElementType::Furniture, name);
        furniture.position = position;
        furniture.dimensions = dimensions;
        furniture.properties.catalog_id = catalog_id.into();
        furniture
    }

    pub fn with_position(mut self, position: Point3D) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Rotation3D) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_dimensions(mut self, dimensions: Dimensions3D) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_properties(mut self, properties: ElementProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_parent(mut self, parent_id: ElementId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Fingerprint of this element's mutable content.
    pub fn content_fingerprint(&self) -> TypeResult<Fingerprint> {
        let view = ContentView {
            element_type: self.element_type,
            name: &self.name,
            position: &self.position,
            rotation: &self.rotation,
            dimensions: &self.dimensions,
            properties: &self.properties,
        };
        let canonical =
            serde_json::to_vec(&view).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Ok(Fingerprint::of_content(&canonical))
    }

    /// Content fields that differ between `self` and `other`.
    pub fn changed_fields(&self, other: &Element) -> Vec<ElementField> {
        let mut fields = Vec::new();
        if self.element_type != other.element_type {
            fields.push(ElementField::Type);
        }
        if self.name != other.name {
            fields.push(ElementField::Name);
        }
        if self.position != other.position {
            fields.push(ElementField::Position);
        }
        if self.rotation != other.rotation {
            fields.push(ElementField::Rotation);
        }
        if self.dimensions != other.dimensions {
            fields.push(ElementField::Dimensions);
        }
        if self.properties != other.properties {
            fields.push(ElementField::Properties);
        }
        fields
    }

    /// Returns `true` if both elements carry the same content.
    pub fn same_content(&self, other: &Element) -> bool {
        self.changed_fields(other).is_empty()
    }

    /// Copy this element's content into `branch_id` as a new row.
    ///
    /// The copy gets a fresh id, version 1 and fresh timestamps. It keeps the
    /// lineage and records this element's fingerprint as its base. The
    /// parent reference is carried over unchanged; callers copying a whole
    /// branch remap it to the parent's copy.
    pub fn fork_into(&self, branch_id: BranchId) -> TypeResult<Element> {
        let base = self.content_fingerprint()?;
        let now = Utc::now();
        Ok(Element {
            id: ElementId::new(),
            branch_id,
            version: 1,
            is_deleted: false,
            base_fingerprint: Some(base),
            created_at: now,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Overwrite this element's content with `source`'s content.
    ///
    /// Identity, branch, parent, version and deletion state are untouched.
    pub fn take_content_from(&mut self, source: &Element) {
        self.element_type = source.element_type;
        self.name = source.name.clone();
        self.position = source.position;
        self.rotation = source.rotation;
        self.dimensions = source.dimensions;
        self.properties = source.properties.clone();
    }

    /// Advance the version by one and refresh `updated_at`.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Mark as deleted. The version is advanced by the store's update path.
    pub fn mark_deleted(&mut self) {
        self.is_deleted = true;
    }

    /// Returns `true` if the element is not soft-deleted.
    pub fn is_live(&self) -> bool {
        !self.is_deleted
    }
}
