//! Groups the placed boxes of a container into vertical layers for rendering.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::{Container, Generation, GenerationDraft, Layer, LayeredContainer, PackBox};

/// Why a container's boxes could not be split into layers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayeringError {
    #[error("average box height is zero, layers are undefined")]
    ZeroAverageHeight,
    #[error("box at index {index} has no vertical position")]
    UnplacedBox { index: usize },
}

/// Splits the boxes of `container` into layers ordered by layer index.
///
/// Each box lands in layer `floor(y / average_height)`, where
/// `average_height` is the mean height of all boxes in the container.
/// An empty container yields no layers.
///
/// # Errors
/// * `ZeroAverageHeight` if the mean height is zero
/// * `UnplacedBox` if a box carries no `y` coordinate
pub fn organize_boxes_into_layers(container: &Container) -> Result<Vec<Layer>, LayeringError> {
    let boxes = &container.boxes;
    if boxes.is_empty() {
        return Ok(Vec::new());
    }

    let total_height: f64 = boxes.iter().map(|b| b.height as f64).sum();
    let average_height = total_height / boxes.len() as f64;
    if average_height == 0.0 {
        return Err(LayeringError::ZeroAverageHeight);
    }

    let mut layers: BTreeMap<i64, Vec<PackBox>> = BTreeMap::new();
    for (index, item) in boxes.iter().enumerate() {
        let y = item.y.ok_or(LayeringError::UnplacedBox { index })?;
        let layer_index = (y as f64 / average_height).floor() as i64;
        layers.entry(layer_index).or_default().push(item.clone());
    }

    Ok(layers.into_values().map(|boxes| Layer { boxes }).collect())
}

/// Layers every container of a draft and drops the raw box lists.
///
/// Fails as a whole if any container cannot be layered.
pub fn finalize(draft: GenerationDraft) -> Result<Generation, LayeringError> {
    let GenerationDraft { containers, meta } = draft;

    let containers = containers
        .into_iter()
        .map(|container| {
            let layers = organize_boxes_into_layers(&container)?;
            Ok(LayeredContainer::from_container(container, layers))
        })
        .collect::<Result<Vec<_>, LayeringError>>()?;

    Ok(Generation { containers, meta })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Extents, GridPoint};
    use proptest::prelude::*;
    use serde_json::{Map, json};

    fn stacked(height: i64, y: i64, id: usize) -> PackBox {
        let mut item = PackBox::new(1, height, 1).with_meta("id", id);
        item.commit(Extents::new(1, height, 1), GridPoint::new(0, y, 0));
        item
    }

    fn container_with(boxes: Vec<PackBox>) -> Container {
        let mut container = Container::new(1, 100, 100, 100);
        container.boxes = boxes;
        container
    }

    #[test]
    fn evenly_stacked_boxes_form_one_layer_each() {
        let container = container_with(vec![stacked(10, 0, 1), stacked(10, 10, 2), stacked(10, 20, 3)]);
        let layers = organize_boxes_into_layers(&container).unwrap();

        let bottoms: Vec<Option<i64>> = layers.iter().map(|l| l.boxes[0].y).collect();
        assert_eq!(bottoms, vec![Some(0), Some(10), Some(20)]);
        assert!(layers.iter().all(|l| l.boxes.len() == 1));
        assert_eq!(layers[2].boxes[0].id(), Some(&json!(3)));
    }

    #[test]
    fn layers_are_sorted_by_index_not_insertion() {
        let container = container_with(vec![stacked(10, 25, 1), stacked(10, 0, 2), stacked(10, 3, 3)]);
        let layers = organize_boxes_into_layers(&container).unwrap();

        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].boxes.len(), 2);
        assert_eq!(layers[1].boxes[0].y, Some(25));
    }

    #[test]
    fn empty_container_has_no_layers() {
        let container = Container::new(1, 10, 10, 10);
        assert_eq!(organize_boxes_into_layers(&container), Ok(Vec::new()));
    }

    #[test]
    fn zero_average_height_is_an_error() {
        let container = container_with(vec![stacked(0, 0, 1), stacked(0, 5, 2)]);
        assert_eq!(
            organize_boxes_into_layers(&container),
            Err(LayeringError::ZeroAverageHeight)
        );
    }

    #[test]
    fn box_without_position_is_an_error() {
        let container = container_with(vec![stacked(10, 0, 1), PackBox::new(1, 1, 1)]);
        assert_eq!(
            organize_boxes_into_layers(&container),
            Err(LayeringError::UnplacedBox { index: 1 })
        );
    }

    #[test]
    fn finalize_replaces_boxes_with_layers() {
        let mut meta = Map::new();
        meta.insert("run".into(), json!(4));
        let draft = GenerationDraft {
            containers: vec![
                container_with(vec![stacked(10, 0, 1), stacked(10, 10, 2)]),
                Container::new(2, 5, 5, 5),
            ],
            meta,
        };

        let generation = finalize(draft).unwrap();
        assert_eq!(generation.containers.len(), 2);
        assert_eq!(generation.containers[0].layers.len(), 2);
        assert!(generation.containers[1].layers.is_empty());

        let value = serde_json::to_value(&generation).unwrap();
        assert_eq!(value["run"], json!(4));
        assert!(value["containers"][0].get("boxes").is_none());

        // each layer goes out as a plain list of boxes
        let layers = &value["containers"][0]["layers"];
        assert!(layers[0].is_array());
        assert_eq!(layers[1][0]["y"], json!(10));
    }

    #[test]
    fn finalize_fails_when_any_container_fails() {
        let draft = GenerationDraft {
            containers: vec![
                container_with(vec![stacked(10, 0, 1)]),
                container_with(vec![stacked(0, 0, 2)]),
            ],
            meta: Map::new(),
        };
        assert_eq!(finalize(draft), Err(LayeringError::ZeroAverageHeight));
    }

    proptest! {
        #[test]
        fn layers_partition_the_boxes(
            specs in prop::collection::vec((1i64..20, 0i64..200), 1..30),
        ) {
            let boxes: Vec<PackBox> = specs
                .iter()
                .enumerate()
                .map(|(id, &(height, y))| stacked(height, y, id))
                .collect();
            let container = container_with(boxes);
            let layers = organize_boxes_into_layers(&container).unwrap();

            let mut seen: Vec<u64> = layers
                .iter()
                .flat_map(|l| l.boxes.iter())
                .map(|b| b.id().and_then(|id| id.as_u64()).unwrap())
                .collect();
            seen.sort_unstable();
            prop_assert_eq!(seen, (0..specs.len() as u64).collect::<Vec<_>>());

            let average = specs.iter().map(|&(h, _)| h as f64).sum::<f64>() / specs.len() as f64;
            let bands: Vec<Vec<i64>> = layers
                .iter()
                .map(|l| {
                    l.boxes
                        .iter()
                        .map(|b| (b.y.unwrap() as f64 / average).floor() as i64)
                        .collect()
                })
                .collect();
            for band in &bands {
                prop_assert!(band.iter().all(|&i| i == band[0]));
            }
            for pair in bands.windows(2) {
                prop_assert!(pair[0][0] < pair[1][0]);
            }
        }
    }
}
