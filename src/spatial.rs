//! Spatial partitioning for collision broad-phase and radius queries.
//!
//! Provides O(1) cell lookup and O(k) neighbor queries where k is the number
//! of entities in nearby cells, rather than O(n) for brute force.
//!
//! Each entity is inserted into every cell its collision circle overlaps, so
//! bodies larger than a cell are still found from any overlapped cell. Pair
//! candidates are taken from cell co-residency; callers deduplicate with an
//! ordered id pair. This bounds pair-checking to O(n·k) for typical spatial
//! density; a pair can only be missed if neither body's circle reaches a
//! shared cell, which cover-based insertion rules out.

use bevy_ecs::prelude::*;
use std::collections::HashMap;

use crate::components::{mask_has, Dead, Health, Motion, Tag, Tags, Transform};

/// Grid-based spatial partitioning structure.
#[derive(Resource, Debug)]
pub struct SpatialGrid {
    /// Cell size in world units.
    pub cell_size: f32,
    /// Map from cell coordinates to the entities overlapping that cell.
    cells: HashMap<(i32, i32), Vec<SpatialEntry>>,
    /// Number of distinct entities inserted.
    count: usize,
}

/// Entry in a spatial cell.
#[derive(Debug, Clone, Copy)]
pub struct SpatialEntry {
    pub entity: Entity,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Compact [`Tags`] bitmask for cheap filtering.
    pub mask: u8,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(32.0)
    }
}

impl SpatialGrid {
    /// Create a new spatial grid with the given cell size.
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            count: 0,
        }
    }

    /// Convert world coordinates to cell coordinates.
    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Clear all entries (call at the start of each tick before rebuilding).
    pub fn clear(&mut self) {
        self.cells.clear();
        self.count = 0;
    }

    /// Insert an entity into every cell overlapped by its collision circle.
    pub fn insert(&mut self, entity: Entity, x: f32, y: f32, radius: f32, mask: u8) {
        let entry = SpatialEntry {
            entity,
            x,
            y,
            radius,
            mask,
        };
        let (min_cx, min_cy) = self.world_to_cell(x - radius, y - radius);
        let (max_cx, max_cy) = self.world_to_cell(x + radius, y + radius);
        for cx in min_cx..=max_cx {
            for cy in min_cy..=max_cy {
                self.cells.entry((cx, cy)).or_default().push(entry);
            }
        }
        self.count += 1;
    }

    /// Query all entities whose center lies within `radius` of a point.
    /// Results are deduplicated and sorted nearest-first, ties broken by
    /// entity id for deterministic selection.
    pub fn query_radius(&self, x: f32, y: f32, radius: f32) -> Vec<SpatialEntry> {
        let radius_sq = radius * radius;
        let (min_cx, min_cy) = self.world_to_cell(x - radius, y - radius);
        let (max_cx, max_cy) = self.world_to_cell(x + radius, y + radius);

        let mut results = Vec::new();
        for cx in min_cx..=max_cx {
            for cy in min_cy..=max_cy {
                if let Some(entries) = self.cells.get(&(cx, cy)) {
                    for entry in entries {
                        let dist_sq = (entry.x - x).powi(2) + (entry.y - y).powi(2);
                        if dist_sq <= radius_sq {
                            results.push(*entry);
                        }
                    }
                }
            }
        }

        results.sort_by(|a, b| {
            let dist_a = (a.x - x).powi(2) + (a.y - y).powi(2);
            let dist_b = (b.x - x).powi(2) + (b.y - y).powi(2);
            dist_a
                .partial_cmp(&dist_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.entity.cmp(&b.entity))
        });
        results.dedup_by_key(|e| e.entity);
        results
    }

    /// Query entities carrying `tag` within `radius` of a point.
    pub fn query_tagged(&self, x: f32, y: f32, radius: f32, tag: Tag) -> Vec<SpatialEntry> {
        let mut results = self.query_radius(x, y, radius);
        results.retain(|e| mask_has(e.mask, tag));
        results
    }

    /// Candidate collision pairs: every unordered pair sharing at least one
    /// cell, deduplicated, sorted by id pair for deterministic resolution
    /// order.
    pub fn candidate_pairs(&self) -> Vec<(Entity, Entity)> {
        let mut pairs = Vec::new();
        for entries in self.cells.values() {
            for i in 0..entries.len() {
                for j in (i + 1)..entries.len() {
                    let (a, b) = (entries[i].entity, entries[j].entity);
                    if a == b {
                        continue;
                    }
                    pairs.push(if a < b { (a, b) } else { (b, a) });
                }
            }
        }
        pairs.sort();
        pairs.dedup();
        pairs
    }

    /// Number of distinct entities inserted this tick.
    pub fn total_count(&self) -> usize {
        self.count
    }
}

/// System that rebuilds the spatial grid from live bodies each tick. Runs
/// after integration so entries reflect post-move positions. Entities whose
/// health has reached zero are left out; they are waiting on the death
/// sweep and should not be targets or obstacles.
pub fn spatial_index_system(
    mut grid: ResMut<SpatialGrid>,
    query: Query<(Entity, &Transform, &Motion, &Tags, Option<&Health>), Without<Dead>>,
) {
    grid.clear();
    for (entity, transform, motion, tags, health) in query.iter() {
        if let Some(health) = health {
            if !health.is_alive() {
                continue;
            }
        }
        grid.insert(entity, transform.x, transform.y, motion.radius, tags.mask());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_radius_query() {
        let mut grid = SpatialGrid::new(32.0);

        let e1 = Entity::from_raw(1);
        let e2 = Entity::from_raw(2);
        let e3 = Entity::from_raw(3);

        grid.insert(e1, 5.0, 5.0, 8.0, 0);
        grid.insert(e2, 20.0, 5.0, 8.0, 0);
        grid.insert(e3, 300.0, 300.0, 8.0, 0);

        let nearby = grid.query_radius(5.0, 5.0, 30.0);
        assert_eq!(nearby.len(), 2);
        assert_eq!(nearby[0].entity, e1); // nearest first

        let tight = grid.query_radius(5.0, 5.0, 5.0);
        assert_eq!(tight.len(), 1);

        let far = grid.query_radius(300.0, 300.0, 10.0);
        assert_eq!(far.len(), 1);
        assert_eq!(far[0].entity, e3);
    }

    #[test]
    fn test_query_excludes_beyond_radius() {
        let mut grid = SpatialGrid::new(32.0);
        grid.insert(Entity::from_raw(1), 0.0, 0.0, 4.0, 0);
        grid.insert(Entity::from_raw(2), 100.0, 0.0, 4.0, 0);

        // Entity at distance 100 must not appear in a 99-unit query even
        // though its cells may be scanned.
        let results = grid.query_radius(0.0, 0.0, 99.0);
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_large_body_found_from_any_overlapped_cell() {
        let mut grid = SpatialGrid::new(32.0);
        // Radius 80 spans several cells around the origin.
        let big = Entity::from_raw(7);
        grid.insert(big, 0.0, 0.0, 80.0, 0);

        // A probe near the edge of the big body's coverage still sees it.
        let hits = grid.query_radius(70.0, 0.0, 75.0);
        assert!(hits.iter().any(|e| e.entity == big));
        // And it is reported only once despite multi-cell insertion.
        assert_eq!(hits.iter().filter(|e| e.entity == big).count(), 1);
    }

    #[test]
    fn test_candidate_pairs_deduplicated() {
        let mut grid = SpatialGrid::new(32.0);
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);
        // Both large enough to share multiple cells.
        grid.insert(a, 0.0, 0.0, 40.0, 0);
        grid.insert(b, 10.0, 0.0, 40.0, 0);

        let pairs = grid.candidate_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0], (a, b));
    }

    #[test]
    fn test_tag_filtered_query() {
        let mut grid = SpatialGrid::new(32.0);
        let player = Entity::from_raw(1);
        let enemy = Entity::from_raw(2);
        grid.insert(player, 0.0, 0.0, 8.0, Tags::new(&[Tag::Player]).mask());
        grid.insert(enemy, 10.0, 0.0, 8.0, Tags::new(&[Tag::Enemy]).mask());

        let players = grid.query_tagged(0.0, 0.0, 50.0, Tag::Player);
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].entity, player);
    }
}
