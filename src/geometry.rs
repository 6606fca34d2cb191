//! Geometric fit test for the integer placement grid.
//!
//! A candidate fits when it lies inside the container and does not share
//! interior volume with any box already committed to it.

use crate::model::Container;
use crate::types::{BoundingBox, Dimensional, Extents, GridPoint};

/// Checks whether a box with `extents` at `position` fits into `container`.
///
/// The box must lie within `[0, width) × [0, height) × [0, length)` of the
/// container and must not overlap any committed box. Touching faces are
/// allowed. Committed boxes without a position occupy no space.
///
/// # Parameters
/// * `container` - The container with its committed boxes
/// * `extents` - Candidate orientation of the box
/// * `position` - Candidate lower corner
///
/// # Returns
/// `true` if the candidate is a valid placement
pub fn fits(container: &Container, extents: Extents, position: GridPoint) -> bool {
    let candidate = BoundingBox::from_position_and_extents(position, extents);
    if !candidate.within(container.extents()) {
        return false;
    }

    !container
        .boxes
        .iter()
        .filter_map(BoundingBox::of)
        .any(|existing| existing.intersects(&candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackBox;
    use proptest::prelude::*;

    fn placed(extents: Extents, position: GridPoint) -> PackBox {
        let mut item = PackBox::new(extents.width, extents.height, extents.length);
        item.commit(extents, position);
        item
    }

    #[test]
    fn empty_container_accepts_box_at_origin() {
        let container = Container::new(1, 10, 10, 10);
        assert!(fits(&container, Extents::new(5, 5, 5), GridPoint::new(0, 0, 0)));
        assert!(fits(&container, Extents::new(10, 10, 10), GridPoint::new(0, 0, 0)));
    }

    #[test]
    fn rejects_box_crossing_the_walls() {
        let container = Container::new(1, 10, 10, 10);
        assert!(!fits(&container, Extents::new(11, 1, 1), GridPoint::new(0, 0, 0)));
        assert!(!fits(&container, Extents::new(5, 5, 5), GridPoint::new(6, 0, 0)));
        assert!(!fits(&container, Extents::new(5, 5, 5), GridPoint::new(0, 6, 0)));
        assert!(!fits(&container, Extents::new(5, 5, 5), GridPoint::new(0, 0, 6)));
        assert!(!fits(&container, Extents::new(1, 1, 1), GridPoint::new(-1, 0, 0)));
    }

    #[test]
    fn rejects_overlap_on_all_three_axes() {
        let mut container = Container::new(1, 10, 10, 10);
        container
            .boxes
            .push(placed(Extents::new(5, 5, 5), GridPoint::new(0, 0, 0)));

        assert!(!fits(&container, Extents::new(5, 5, 5), GridPoint::new(4, 4, 4)));
        assert!(fits(&container, Extents::new(5, 5, 5), GridPoint::new(5, 0, 0)));
        assert!(fits(&container, Extents::new(5, 5, 5), GridPoint::new(0, 5, 0)));
        assert!(fits(&container, Extents::new(5, 5, 5), GridPoint::new(0, 0, 5)));
    }

    #[test]
    fn unpositioned_boxes_occupy_no_space() {
        let mut container = Container::new(1, 10, 10, 10);
        container.boxes.push(PackBox::new(10, 10, 10));
        assert!(fits(&container, Extents::new(10, 10, 10), GridPoint::new(0, 0, 0)));
    }

    #[test]
    fn non_positive_container_accepts_nothing() {
        let container = Container::new(1, 0, 10, 10);
        assert!(!fits(&container, Extents::new(1, 1, 1), GridPoint::new(0, 0, 0)));
    }

    fn relabel(extents: Extents, order: [usize; 3]) -> Extents {
        let axes = [extents.width, extents.height, extents.length];
        Extents::new(axes[order[0]], axes[order[1]], axes[order[2]])
    }

    fn relabel_point(point: GridPoint, order: [usize; 3]) -> GridPoint {
        let axes = [point.x, point.y, point.z];
        GridPoint::new(axes[order[0]], axes[order[1]], axes[order[2]])
    }

    const AXIS_ORDERS: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    proptest! {
        #[test]
        fn verdict_survives_axis_relabeling(
            bounds in (1i64..8, 1i64..8, 1i64..8),
            existing in prop::collection::vec(((1i64..5, 1i64..5, 1i64..5), (0i64..8, 0i64..8, 0i64..8)), 0..4),
            candidate in ((1i64..6, 1i64..6, 1i64..6), (-1i64..8, -1i64..8, -1i64..8)),
            order_idx in 0usize..6,
        ) {
            let order = AXIS_ORDERS[order_idx];
            let bounds = Extents::new(bounds.0, bounds.1, bounds.2);
            let (cand_dims, cand_pos) = candidate;
            let cand_dims = Extents::new(cand_dims.0, cand_dims.1, cand_dims.2);
            let cand_pos = GridPoint::new(cand_pos.0, cand_pos.1, cand_pos.2);

            let mut original = Container::new(1, bounds.width, bounds.height, bounds.length);
            let relabeled_bounds = relabel(bounds, order);
            let mut relabeled = Container::new(
                1,
                relabeled_bounds.width,
                relabeled_bounds.height,
                relabeled_bounds.length,
            );
            for (dims, pos) in existing {
                let dims = Extents::new(dims.0, dims.1, dims.2);
                let pos = GridPoint::new(pos.0, pos.1, pos.2);
                original.boxes.push(placed(dims, pos));
                relabeled
                    .boxes
                    .push(placed(relabel(dims, order), relabel_point(pos, order)));
            }

            prop_assert_eq!(
                fits(&original, cand_dims, cand_pos),
                fits(
                    &relabeled,
                    relabel(cand_dims, order),
                    relabel_point(cand_pos, order)
                )
            );
        }
    }
}
