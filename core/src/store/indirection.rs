use tracing::warn;

use strata_proto::{EntityId, Value};

use crate::store::{cells, EntityStore};

/// Hop separator inside indirected field paths.
const SEPARATOR: &str = "->";

impl EntityStore {
    /// Resolve an indirected field path starting from `entity_id`. Every
    /// segment but the last is a hop: `parent`, `children[<index>]`, or a
    /// reference-typed field to follow. Returns the terminal field and the
    /// entity it lives on, or `None` when any hop fails.
    pub async fn resolve_indirection(&self, path: &str, entity_id: &EntityId) -> Option<(String, EntityId)> {
        if !path.contains(SEPARATOR) {
            return Some((path.to_string(), *entity_id));
        }

        let segments: Vec<&str> = path.split(SEPARATOR).collect();
        let mut current = *entity_id;

        for segment in &segments[..segments.len() - 1] {
            if *segment == "parent" {
                let entity = self.get_entity(&current).await?;
                match entity.parent {
                    Some(parent_id) => current = parent_id,
                    None => {
                        warn!(%current, path, "resolve_indirection: entity has no parent");
                        return None;
                    }
                }
            } else if let Some(index) = parse_child_index(segment) {
                let entity = self.get_entity(&current).await?;
                match entity.children.get(index) {
                    Some(child_id) => current = *child_id,
                    None => {
                        warn!(%current, path, index, "resolve_indirection: child index out of range");
                        return None;
                    }
                }
            } else {
                let cell = match cells::read_cell(self.backend().as_ref(), segment, &current).await {
                    Ok(cell) => cell,
                    Err(err) => {
                        warn!(%current, path, %segment, %err, "resolve_indirection: hop field read failed");
                        return None;
                    }
                };
                match cell.value {
                    Value::EntityReference(next) if !next.is_nil() => current = next,
                    _ => {
                        warn!(%current, path, %segment, "resolve_indirection: hop field is not a set reference");
                        return None;
                    }
                }
            }
        }

        Some((segments[segments.len() - 1].to_string(), current))
    }
}

fn parse_child_index(segment: &str) -> Option<usize> {
    segment.strip_prefix("children[")?.strip_suffix(']')?.parse().ok()
}
