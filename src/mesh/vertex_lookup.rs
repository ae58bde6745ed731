use glam::Vec3;
use rustc_hash::FxHashMap;

/// Nearest-vertex spatial query over the snapshot's vertex positions.
///
/// A uniform grid keyed by cell coordinate; queries expand outward in
/// Chebyshev rings until no closer vertex can exist in an unvisited ring.
/// Positions are captured at build time, so the structure answers queries
/// against the deformation state the snapshot was built (or last refreshed)
/// with.
#[derive(Debug, Clone)]
pub struct VertexLookup {
    cell_size: f32,
    cells: FxHashMap<(i32, i32, i32), Vec<u32>>,
    positions: Vec<Vec3>,
    min_cell: (i32, i32, i32),
    max_cell: (i32, i32, i32),
}

impl VertexLookup {
    pub fn build(positions: &[Vec3]) -> Self {
        let cell_size = pick_cell_size(positions);
        Self::build_with_cell_size(positions, cell_size)
    }

    pub fn build_with_cell_size(positions: &[Vec3], cell_size: f32) -> Self {
        let cell_size = cell_size.max(1e-6);
        let mut cells: FxHashMap<(i32, i32, i32), Vec<u32>> = FxHashMap::default();
        let mut min_cell = (i32::MAX, i32::MAX, i32::MAX);
        let mut max_cell = (i32::MIN, i32::MIN, i32::MIN);

        for (index, position) in positions.iter().enumerate() {
            let cell = cell_of(*position, cell_size);
            min_cell = (
                min_cell.0.min(cell.0),
                min_cell.1.min(cell.1),
                min_cell.2.min(cell.2),
            );
            max_cell = (
                max_cell.0.max(cell.0),
                max_cell.1.max(cell.1),
                max_cell.2.max(cell.2),
            );
            cells.entry(cell).or_default().push(index as u32);
        }

        Self {
            cell_size,
            cells,
            positions: positions.to_vec(),
            min_cell,
            max_cell,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Index of and distance to the vertex nearest to `point`.
    pub fn find_nearest(&self, point: Vec3) -> Option<(u32, f32)> {
        if self.positions.is_empty() {
            return None;
        }

        // scan around the query's cell clamped into the occupied bounds, so
        // a query far outside the grid does not walk empty rings; ring count
        // is then capped by the grid span
        let query_cell = cell_of(point, self.cell_size);
        let center = (
            query_cell.0.clamp(self.min_cell.0, self.max_cell.0),
            query_cell.1.clamp(self.min_cell.1, self.max_cell.1),
            query_cell.2.clamp(self.min_cell.2, self.max_cell.2),
        );
        // Chebyshev cell distance from the query's own cell to the scan center
        let center_offset = (query_cell.0 - center.0)
            .abs()
            .max((query_cell.1 - center.1).abs())
            .max((query_cell.2 - center.2).abs());

        let ring_limit = [
            center.0 - self.min_cell.0,
            self.max_cell.0 - center.0,
            center.1 - self.min_cell.1,
            self.max_cell.1 - center.1,
            center.2 - self.min_cell.2,
            self.max_cell.2 - center.2,
        ]
        .into_iter()
        .max()
        .unwrap_or(0);

        let mut best: Option<(u32, f32)> = None;
        for ring in 0..=ring_limit {
            // a vertex in scan ring R is at least R - center_offset cells
            // from the query's cell, hence at least that many cells minus
            // one of actual distance away
            if let Some((_, best_dist)) = best {
                if (ring - center_offset - 1).max(0) as f32 * self.cell_size > best_dist {
                    break;
                }
            }

            self.scan_ring(center, ring, point, &mut best);
        }

        best
    }

    fn scan_ring(
        &self,
        center: (i32, i32, i32),
        ring: i32,
        point: Vec3,
        best: &mut Option<(u32, f32)>,
    ) {
        for dx in -ring..=ring {
            for dy in -ring..=ring {
                for dz in -ring..=ring {
                    if dx.abs().max(dy.abs()).max(dz.abs()) != ring {
                        continue;
                    }
                    let cell = (center.0 + dx, center.1 + dy, center.2 + dz);
                    let Some(indices) = self.cells.get(&cell) else {
                        continue;
                    };
                    for &index in indices {
                        let dist = self.positions[index as usize].distance(point);
                        if best.map_or(true, |(_, d)| dist < d) {
                            *best = Some((index, dist));
                        }
                    }
                }
            }
        }
    }
}

fn cell_of(position: Vec3, cell_size: f32) -> (i32, i32, i32) {
    (
        (position.x / cell_size).floor() as i32,
        (position.y / cell_size).floor() as i32,
        (position.z / cell_size).floor() as i32,
    )
}

fn pick_cell_size(positions: &[Vec3]) -> f32 {
    if positions.is_empty() {
        return 1.0;
    }
    let mut min = positions[0];
    let mut max = positions[0];
    for p in positions {
        min = min.min(*p);
        max = max.max(*p);
    }
    let extent = (max - min).max_element();
    (extent / 16.0).max(1e-4)
}
