//! Authoritative packing state.
//!
//! The store is owned by the session dispatch loop. All changes go through the
//! three mutation entry points below; viewers only ever see cloned snapshots.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::layers::{LayeringError, finalize};
use crate::model::{Container, Generation, GenerationDraft, PackBox};
use crate::placement::{Placement, place_into_first_fitting};

/// Full state as broadcast to viewers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PackingState {
    pub containers: Vec<Container>,
    /// Holds at most one generation; a new one replaces the old.
    pub generations: Vec<Generation>,
}

#[derive(Debug, Default)]
pub struct StateStore {
    state: PackingState,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view of the current state.
    pub fn state(&self) -> &PackingState {
        &self.state
    }

    /// Optionally replaces the container list, then places `item` into the
    /// first container that has room.
    ///
    /// # Returns
    /// Index of the accepting container and the placement, `None` if the box
    /// did not fit anywhere.
    pub fn replace_containers_and_place(
        &mut self,
        containers: Option<Vec<Container>>,
        item: &PackBox,
    ) -> Option<(usize, Placement)> {
        if let Some(containers) = containers {
            self.state.containers = containers;
        }
        place_into_first_fitting(&mut self.state.containers, item)
    }

    /// Layers the draft and stores it as the only generation.
    ///
    /// The store is unchanged when layering fails.
    pub fn finalize_generation(&mut self, draft: GenerationDraft) -> Result<(), LayeringError> {
        let generation = finalize(draft)?;
        self.state.generations = vec![generation];
        Ok(())
    }

    /// Overwrites the advisory remaining volume of the container with
    /// identity `container_id`.
    ///
    /// # Returns
    /// `false` if no such container exists; nothing changes in that case.
    pub fn update_remaining_volume(&mut self, container_id: &Value, volume: Value) -> bool {
        match self
            .state
            .containers
            .iter_mut()
            .find(|container| &container.id == container_id)
        {
            Some(container) => {
                container.total_remaining_volume = Some(volume);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Positioned;
    use serde_json::json;

    fn draft(value: Value) -> GenerationDraft {
        serde_json::from_value(value).expect("draft should deserialize")
    }

    #[test]
    fn supplied_containers_replace_stored_ones() {
        let mut store = StateStore::new();
        store.replace_containers_and_place(Some(vec![Container::new(1, 10, 10, 10)]), &PackBox::new(1, 1, 1));

        let placed = store.replace_containers_and_place(
            Some(vec![Container::new(2, 4, 4, 4)]),
            &PackBox::new(2, 2, 2),
        );

        assert_eq!(placed.map(|(idx, _)| idx), Some(0));
        assert_eq!(store.state().containers.len(), 1);
        assert_eq!(store.state().containers[0].id, json!(2));
        assert_eq!(store.state().containers[0].boxes.len(), 1);
    }

    #[test]
    fn missing_containers_keep_stored_ones() {
        let mut store = StateStore::new();
        store.replace_containers_and_place(Some(vec![Container::new(1, 10, 10, 10)]), &PackBox::new(5, 5, 5));
        store.replace_containers_and_place(None, &PackBox::new(5, 5, 5));

        let boxes = &store.state().containers[0].boxes;
        assert_eq!(boxes.len(), 2);
        assert_ne!(boxes[0].position(), boxes[1].position());
    }

    #[test]
    fn failed_placement_leaves_boxes_untouched() {
        let mut store = StateStore::new();
        let result = store.replace_containers_and_place(
            Some(vec![Container::new(1, 10, 10, 10)]),
            &PackBox::new(12, 1, 1),
        );

        assert_eq!(result, None);
        assert!(store.state().containers[0].boxes.is_empty());
    }

    #[test]
    fn new_generation_replaces_previous() {
        let mut store = StateStore::new();
        store
            .finalize_generation(draft(json!({"containers": [], "name": "first"})))
            .unwrap();
        store
            .finalize_generation(draft(json!({
                "name": "second",
                "containers": [{
                    "id": 1, "width": 10, "height": 30, "length": 10,
                    "boxes": [
                        {"width": 1, "height": 10, "length": 1, "x": 0, "y": 0, "z": 0},
                        {"width": 1, "height": 10, "length": 1, "x": 0, "y": 10, "z": 0},
                        {"width": 1, "height": 10, "length": 1, "x": 0, "y": 20, "z": 0}
                    ]
                }]
            })))
            .unwrap();

        let generations = &store.state().generations;
        assert_eq!(generations.len(), 1);
        assert_eq!(generations[0].meta["name"], json!("second"));
        let bottoms: Vec<Option<i64>> = generations[0].containers[0]
            .layers
            .iter()
            .map(|l| l.boxes[0].y)
            .collect();
        assert_eq!(bottoms, vec![Some(0), Some(10), Some(20)]);
    }

    #[test]
    fn failed_generation_keeps_previous() {
        let mut store = StateStore::new();
        store
            .finalize_generation(draft(json!({"containers": [], "name": "kept"})))
            .unwrap();

        let result = store.finalize_generation(draft(json!({
            "containers": [{
                "id": 1, "width": 10, "height": 10, "length": 10,
                "boxes": [{"width": 1, "height": 0, "length": 1, "x": 0, "y": 0, "z": 0}]
            }]
        })));

        assert_eq!(result, Err(LayeringError::ZeroAverageHeight));
        assert_eq!(store.state().generations[0].meta["name"], json!("kept"));
    }

    #[test]
    fn remaining_volume_updates_matching_container_only() {
        let mut store = StateStore::new();
        store.replace_containers_and_place(
            Some(vec![Container::new("a", 1, 1, 1), Container::new("b", 1, 1, 1)]),
            &PackBox::new(5, 5, 5),
        );

        assert!(store.update_remaining_volume(&json!("b"), json!(42.5)));
        assert_eq!(store.state().containers[0].total_remaining_volume, None);
        assert_eq!(store.state().containers[1].total_remaining_volume, Some(json!(42.5)));
    }

    #[test]
    fn remaining_volume_for_unknown_container_is_ignored() {
        let mut store = StateStore::new();
        store.replace_containers_and_place(Some(vec![Container::new(1, 1, 1, 1)]), &PackBox::new(5, 5, 5));
        let before = store.state().clone();

        assert!(!store.update_remaining_volume(&json!(99), json!(1.0)));
        assert_eq!(store.state(), &before);
    }
}
