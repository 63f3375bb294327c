use serde::{Deserialize, Serialize};

use scene_types::{Element, ElementType};

/// Filter and pagination for branch listings.
///
/// Results are ordered by `created_at` ascending, ties broken by id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    /// Only return elements of this type.
    pub element_type: Option<ElementType>,
    /// Maximum number of rows to return. `None` means unbounded.
    pub limit: Option<usize>,
    /// Rows to skip before collecting.
    pub offset: usize,
    /// Include soft-deleted rows.
    pub include_deleted: bool,
}

impl ListOptions {
    /// Live rows only, unbounded.
    pub fn live() -> Self {
        Self::default()
    }

    /// Live rows and tombstones, unbounded.
    pub fn with_tombstones() -> Self {
        Self {
            include_deleted: true,
            ..Self::default()
        }
    }

    pub fn of_type(mut self, element_type: ElementType) -> Self {
        self.element_type = Some(element_type);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Whether a row passes the filters (pagination excluded).
    pub fn matches(&self, element: &Element) -> bool {
        if element.is_deleted && !self.include_deleted {
            return false;
        }
        match self.element_type {
            Some(t) => element.element_type == t,
            None => true,
        }
    }

    /// Sort, then apply offset and limit.
    pub fn paginate(&self, mut rows: Vec<Element>) -> Vec<Element> {
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        let iter = rows.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}
