//! Placement allocator: positions for newly generated or uploaded images.
//!
//! Scans a bounded grid row-major from a fixed origin. A cell is taken when
//! the candidate box, inflated by the padding, overlaps neither an existing
//! entity nor a box already placed in the same batch. Once the window is
//! exhausted the remainder is appended row-major below the last scanned row,
//! which always terminates but may overlap on very dense canvases.

#[cfg(test)]
#[path = "placement_test.rs"]
mod placement_test;

use crate::consts::{PLACEMENT_COLUMNS, PLACEMENT_ORIGIN_X, PLACEMENT_ORIGIN_Y, PLACEMENT_PADDING, PLACEMENT_ROWS};
use crate::geom::{Point, Rect};
use crate::viewport::Viewport;

/// Grid parameters for the allocator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementConfig {
    pub origin: Point,
    pub padding: f64,
    pub columns: usize,
    pub rows: usize,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            origin: Point::new(PLACEMENT_ORIGIN_X, PLACEMENT_ORIGIN_Y),
            padding: PLACEMENT_PADDING,
            columns: PLACEMENT_COLUMNS,
            rows: PLACEMENT_ROWS,
        }
    }
}

/// Finds mutually non-overlapping positions for new entities.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlacementAllocator {
    config: PlacementConfig,
}

impl PlacementAllocator {
    #[must_use]
    pub fn new(config: PlacementConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> PlacementConfig {
        self.config
    }

    /// Return `count` top-left positions for boxes of `width` × `height`.
    ///
    /// Positions come back in placement (row-major scan) order.
    #[must_use]
    pub fn allocate(&self, existing: &[Rect], width: f64, height: f64, count: usize) -> Vec<Point> {
        let PlacementConfig { origin, padding, columns, rows } = self.config;
        let columns = columns.max(1);
        let cell_w = width + padding;
        let cell_h = height + padding;

        let mut placed: Vec<Point> = Vec::with_capacity(count);
        let mut occupied: Vec<Rect> = Vec::with_capacity(count);

        'scan: for row in 0..rows {
            for col in 0..columns {
                if placed.len() >= count {
                    break 'scan;
                }
                let candidate = Rect::new(origin.x + to_f64(col) * cell_w, origin.y + to_f64(row) * cell_h, width, height);
                let inflated = candidate.inflate(padding);
                let blocked = existing.iter().chain(occupied.iter()).any(|r| inflated.intersects(r));
                if blocked {
                    continue;
                }
                placed.push(Point::new(candidate.x, candidate.y));
                occupied.push(candidate);
            }
        }

        if placed.len() < count {
            let remaining = count - placed.len();
            tracing::warn!(
                requested = count,
                placed = placed.len(),
                remaining,
                "placement window exhausted; appending below scanned rows"
            );
            let base_y = origin.y + to_f64(rows) * cell_h;
            for i in 0..remaining {
                let row = i / columns;
                let col = i % columns;
                placed.push(Point::new(origin.x + to_f64(col) * cell_w, base_y + to_f64(row) * cell_h));
            }
        }

        placed
    }

    /// Mean centre of the boxes placed at `positions`.
    #[must_use]
    pub fn centroid(positions: &[Point], width: f64, height: f64) -> Option<Point> {
        if positions.is_empty() {
            return None;
        }
        let n = to_f64(positions.len());
        let (sx, sy) = positions
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x + width * 0.5, sy + p.y + height * 0.5));
        Some(Point::new(sx / n, sy / n))
    }

    /// Viewport at the current scale that aligns `centroid` with the centre of
    /// a `screen_width` × `screen_height` visible area.
    #[must_use]
    pub fn recenter_target(current: Viewport, centroid: Point, screen_width: f64, screen_height: f64) -> Viewport {
        Viewport::centered_on(centroid, screen_width, screen_height, current.scale)
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_f64(n: usize) -> f64 {
    n as f64
}
