//! The merged collection view.
//!
//! A resource type seen by one owner is the owner's explicitly ordered items
//! (by position) followed by every item the owner never ordered (newest
//! first). Backends fetch the left-joined rows however suits them and hand
//! them to [`merge_view`], so every backend produces the same sequence.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::projection::CollectionItem;
use crate::types::{OrderingRecord, Resource};

/// Equality match on top-level payload fields.
///
/// An empty filter matches every resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceFilter {
    fields: BTreeMap<String, serde_json::Value>,
}

impl ResourceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `payload[field] == value`.
    pub fn field(mut self, field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn matches(&self, resource: &Resource) -> bool {
        self.fields
            .iter()
            .all(|(field, expected)| resource.payload.get(field) == Some(expected))
    }
}

/// Filter and page applied to the merged view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeQuery {
    pub filter: ResourceFilter,
    pub offset: usize,
    /// `None` returns everything after `offset`.
    pub limit: Option<usize>,
}

impl MergeQuery {
    pub fn new(filter: ResourceFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Total order of the merged view.
///
/// Ordered items first by position, then unordered items by creation time
/// descending, ties broken by resource id.
pub fn merged_order(a: &CollectionItem, b: &CollectionItem) -> Ordering {
    match (&a.ordering, &b.ordering) {
        (Some(x), Some(y)) => x
            .position
            .cmp(&y.position)
            .then_with(|| x.resource_id.cmp(&y.resource_id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b
            .resource
            .created_at
            .cmp(&a.resource.created_at)
            .then_with(|| a.resource.id.cmp(&b.resource.id)),
    }
}

/// Filter, sort and page left-joined `(record?, resource)` rows.
pub fn merge_view(
    rows: impl IntoIterator<Item = (Option<OrderingRecord>, Resource)>,
    query: &MergeQuery,
) -> Vec<CollectionItem> {
    let mut items: Vec<CollectionItem> = rows
        .into_iter()
        .filter(|(_, resource)| query.filter.matches(resource))
        .map(|(ordering, resource)| CollectionItem { ordering, resource })
        .collect();
    items.sort_by(merged_order);
    items
        .into_iter()
        .skip(query.offset)
        .take(query.limit.unwrap_or(usize::MAX))
        .collect()
}
