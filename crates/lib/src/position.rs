//! Position arithmetic for dense, zero-based orderings.
//!
//! Everything here is pure and scope-local: callers pass the records of one
//! scope sorted by position and get back the position changes needed to keep
//! the scope dense (`{0, .., k-1}`) after an insert, move, removal or batch
//! reorder. Nothing is written; the engine turns the plans into backend
//! writes.

use std::collections::{HashMap, HashSet};

use crate::engine::OrderingError;
use crate::types::{OrderingRecord, Placement, RecordId, ResourceId};

/// A record whose position changes as a side effect of another operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub id: RecordId,
    pub from: usize,
    pub to: usize,
}

/// Result of [`insert_or_move`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    /// Final position of the moving item.
    pub target: usize,
    /// Existing record of the moving item, with its position before the move.
    pub existing: Option<(RecordId, usize)>,
    /// Every *other* record whose position changes.
    pub shifts: Vec<Shift>,
}

impl MovePlan {
    pub fn is_insert(&self) -> bool {
        self.existing.is_none()
    }
}

/// Compute where `moving` lands and how every other record shifts.
///
/// `current` must be the records of one scope. `Placement::At(p)` is accepted
/// for `p <= current.len()`. Inserting at `current.len()` appends; moving an
/// existing record to `current.len()` lands on the last slot.
pub fn insert_or_move(
    current: &[OrderingRecord],
    placement: Placement,
    moving: &ResourceId,
) -> Result<MovePlan, OrderingError> {
    let count = current.len();
    if let Placement::At(p) = placement
        && p > count
    {
        return Err(OrderingError::PositionOutOfBounds {
            reason: format!("position {p} is outside 0..={count}"),
        });
    }

    let existing = current
        .iter()
        .find(|r| &r.resource_id == moving)
        .map(|r| (r.id, r.position));

    let plan = match existing {
        None => {
            let target = match placement {
                Placement::End => count,
                Placement::At(p) => p,
            };
            let shifts = current
                .iter()
                .filter(|r| r.position >= target)
                .map(|r| Shift {
                    id: r.id,
                    from: r.position,
                    to: r.position + 1,
                })
                .collect();
            MovePlan {
                target,
                existing,
                shifts,
            }
        }
        Some((id, old)) => {
            let last = count - 1;
            let target = match placement {
                Placement::End => last,
                Placement::At(p) => p.min(last),
            };
            let shifts = current
                .iter()
                .filter(|r| r.id != id)
                .filter_map(|r| {
                    let to = if target > old && r.position > old && r.position <= target {
                        r.position - 1
                    } else if target < old && r.position >= target && r.position < old {
                        r.position + 1
                    } else {
                        return None;
                    };
                    Some(Shift {
                        id: r.id,
                        from: r.position,
                        to,
                    })
                })
                .collect();
            MovePlan {
                target,
                existing,
                shifts,
            }
        }
    };
    Ok(plan)
}

/// Shifts closing the gap left by removing the record at `removed`.
pub fn remove_and_compact(current: &[OrderingRecord], removed: usize) -> Vec<Shift> {
    current
        .iter()
        .filter(|r| r.position > removed)
        .map(|r| Shift {
            id: r.id,
            from: r.position,
            to: r.position - 1,
        })
        .collect()
}

/// One slot of a resolved batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub resource_id: ResourceId,
    pub position: usize,
    /// Existing record and its position before the batch, `None` for inserts.
    pub previous: Option<(RecordId, usize)>,
    /// Whether the batch named this resource explicitly.
    pub requested: bool,
}

/// Resolve a batch of `(resource, position)` requests into the final
/// assignment of every record in the scope.
///
/// Requested resources land exactly where asked. Untouched records keep
/// their relative order and fill the remaining slots from the front. The
/// result is sorted by position and always dense.
pub fn resolve_batch(
    current: &[OrderingRecord],
    requests: &[(ResourceId, usize)],
) -> Result<Vec<Assignment>, OrderingError> {
    let mut seen_ids = HashSet::with_capacity(requests.len());
    let mut seen_positions = HashSet::with_capacity(requests.len());
    for (resource_id, position) in requests {
        if !seen_ids.insert(resource_id) {
            return Err(OrderingError::PositionOutOfBounds {
                reason: format!("resource {resource_id} appears more than once in the batch"),
            });
        }
        if !seen_positions.insert(*position) {
            return Err(OrderingError::PositionOutOfBounds {
                reason: format!("position {position} is requested more than once in the batch"),
            });
        }
    }

    let by_resource: HashMap<&ResourceId, &OrderingRecord> =
        current.iter().map(|r| (&r.resource_id, r)).collect();
    let inserted = requests
        .iter()
        .filter(|(id, _)| !by_resource.contains_key(id))
        .count();
    let total = current.len() + inserted;

    let mut slots: Vec<Option<Assignment>> = vec![None; total];
    for (resource_id, position) in requests {
        if *position >= total {
            return Err(OrderingError::PositionOutOfBounds {
                reason: format!(
                    "position {position} is outside 0..{total} for a scope of {total} records"
                ),
            });
        }
        slots[*position] = Some(Assignment {
            resource_id: resource_id.clone(),
            position: *position,
            previous: by_resource.get(resource_id).map(|r| (r.id, r.position)),
            requested: true,
        });
    }

    let mut untouched: Vec<&OrderingRecord> = current
        .iter()
        .filter(|r| !seen_ids.contains(&r.resource_id))
        .collect();
    untouched.sort_by_key(|r| r.position);
    let mut untouched = untouched.into_iter();

    let mut resolved = Vec::with_capacity(total);
    for (position, slot) in slots.into_iter().enumerate() {
        let assignment = match slot {
            Some(assignment) => assignment,
            None => {
                // Counting guarantees one untouched record per free slot.
                let record = untouched.next().ok_or_else(|| OrderingError::PositionOutOfBounds {
                    reason: format!("no record left to fill position {position}"),
                })?;
                Assignment {
                    resource_id: record.resource_id.clone(),
                    position,
                    previous: Some((record.id, record.position)),
                    requested: false,
                }
            }
        };
        resolved.push(assignment);
    }
    Ok(resolved)
}

/// Whether `positions` is exactly `{0, .., n-1}` with no duplicates.
pub fn is_dense<I>(positions: I) -> bool
where
    I: IntoIterator<Item = usize>,
{
    let mut positions: Vec<usize> = positions.into_iter().collect();
    positions.sort_unstable();
    positions.iter().enumerate().all(|(i, p)| i == *p)
}
