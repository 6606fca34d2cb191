//! First-fit placement engine.
//!
//! Tries the six orientations of a box in a fixed order and scans the grid
//! `x` outermost, `y` middle, `z` innermost. The first position that passes
//! the geometric fit test is committed; there is no scoring and no
//! backtracking across boxes.

use std::ops::Range;

use crate::geometry::fits;
use crate::model::{Container, PackBox};
use crate::types::{Dimensional, Extents, GridPoint};

/// Orientation and position chosen for a committed box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub orientation: Extents,
    pub position: GridPoint,
}

/// Result of one placement attempt.
///
/// `NotPlaced` is a regular outcome, not an error: the box simply has no
/// room in the container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementOutcome {
    Placed(Placement),
    NotPlaced,
}

/// Searches the first valid orientation and position for `extents`.
///
/// Candidate positions that would already violate the container bounds are
/// skipped; this never changes which position is found first.
pub fn find_first_fit(container: &Container, extents: Extents) -> Option<Placement> {
    let bounds = container.extents();

    for orientation in extents.orientations() {
        for x in axis_positions(bounds.width, orientation.width) {
            for y in axis_positions(bounds.height, orientation.height) {
                for z in axis_positions(bounds.length, orientation.length) {
                    let position = GridPoint::new(x, y, z);
                    if fits(container, orientation, position) {
                        return Some(Placement {
                            orientation,
                            position,
                        });
                    }
                }
            }
        }
    }

    None
}

/// Tries to commit `item` into `container`.
///
/// On success a copy of the box, rotated and positioned, is appended to the
/// container's box list. On failure the container is left untouched.
///
/// # Parameters
/// * `container` - The container to place into
/// * `item` - The box with its original extents
pub fn add_box_to_container(container: &mut Container, item: &PackBox) -> PlacementOutcome {
    match find_first_fit(container, item.extents()) {
        Some(placement) => {
            let mut committed = item.clone();
            committed.commit(placement.orientation, placement.position);
            container.boxes.push(committed);
            PlacementOutcome::Placed(placement)
        }
        None => PlacementOutcome::NotPlaced,
    }
}

/// Offers `item` to each container in order until one accepts it.
///
/// # Returns
/// Index of the accepting container together with the placement, or `None`
/// if no container has room.
pub fn place_into_first_fitting(
    containers: &mut [Container],
    item: &PackBox,
) -> Option<(usize, Placement)> {
    containers
        .iter_mut()
        .enumerate()
        .find_map(|(idx, container)| match add_box_to_container(container, item) {
            PlacementOutcome::Placed(placement) => Some((idx, placement)),
            PlacementOutcome::NotPlaced => None,
        })
}

/// Grid positions along one axis that keep the box inside `[0, container_len)`.
///
/// Empty for a non-positive container extent.
fn axis_positions(container_len: i64, item_len: i64) -> Range<i64> {
    let last_start = container_len.saturating_sub(item_len);
    0..last_start.saturating_add(1).min(container_len)
}
