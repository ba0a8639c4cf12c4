//! Array grid layout, color mapping and hit-testing.
//!
//! The grid is square in element units: `cols = ceil(sqrt(count))`. Terminal
//! cells are roughly twice as tall as they are wide, so one grid pitch spans
//! `CELL_ASPECT` columns for every row to keep cells visually square.

use crate::theme::Palette;
use pac_core::{clamp_amplitude, ArrayElement, ElementStatus, AMPLITUDE_MAX};
use ratatui::layout::Rect;
use ratatui::style::Color;
use std::collections::HashMap;

/// Used when the element collection is momentarily empty.
pub const DEFAULT_ELEMENT_COUNT: usize = 256;
/// Fraction of a pitch a cell fills; the rest is gutter.
pub const SHRINK: f64 = 0.9;
pub const CELL_ASPECT: f64 = 2.0;

pub fn side_length(count: usize) -> usize {
    let count = if count == 0 {
        DEFAULT_ELEMENT_COUNT
    } else {
        count
    };
    let mut side = (count as f64).sqrt().ceil() as usize;
    while side * side < count {
        side += 1;
    }
    while side > 1 && (side - 1) * (side - 1) >= count {
        side -= 1;
    }
    side
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub origin_x: u16,
    pub origin_y: u16,
    pub cols: u16,
    pub pitch_x: u16,
    pub pitch_y: u16,
    pub cell_w: u16,
    pub cell_h: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridFit {
    /// Zero-sized viewport; nothing is laid out until the next resize.
    Skip,
    TooSmall,
    Fits(GridGeometry),
}

pub fn fit(area: Rect, cols: usize) -> GridFit {
    if area.width == 0 || area.height == 0 {
        return GridFit::Skip;
    }
    let cols = cols.max(1);
    let Ok(cols_u16) = u16::try_from(cols) else {
        return GridFit::TooSmall;
    };
    let side = (area.width as f64 / CELL_ASPECT).min(area.height as f64);
    let pitch = side / cols as f64;
    let pitch_y = pitch.floor() as u16;
    let pitch_x = (pitch * CELL_ASPECT).floor() as u16;
    if pitch_y == 0 || pitch_x == 0 {
        return GridFit::TooSmall;
    }
    let cell_w = ((pitch_x as f64 * SHRINK).floor() as u16).max(1);
    let cell_h = ((pitch_y as f64 * SHRINK).floor() as u16).max(1);
    let total_w = pitch_x.saturating_mul(cols_u16);
    let total_h = pitch_y.saturating_mul(cols_u16);
    GridFit::Fits(GridGeometry {
        origin_x: area.x + area.width.saturating_sub(total_w) / 2,
        origin_y: area.y + area.height.saturating_sub(total_h) / 2,
        cols: cols_u16,
        pitch_x,
        pitch_y,
        cell_w,
        cell_h,
    })
}

impl GridGeometry {
    pub fn cell_rect(&self, col: usize, row: usize) -> Rect {
        Rect {
            x: self.origin_x + self.pitch_x * col as u16,
            y: self.origin_y + self.pitch_y * row as u16,
            width: self.cell_w,
            height: self.cell_h,
        }
    }

    /// Grid slot under a terminal position. Gutters and the area outside the
    /// grid hit nothing.
    pub fn cell_at(&self, column: u16, row: u16) -> Option<(usize, usize)> {
        if column < self.origin_x || row < self.origin_y {
            return None;
        }
        let dx = column - self.origin_x;
        let dy = row - self.origin_y;
        let col = dx / self.pitch_x;
        let line = dy / self.pitch_y;
        if col >= self.cols || line >= self.cols {
            return None;
        }
        if dx % self.pitch_x >= self.cell_w || dy % self.pitch_y >= self.cell_h {
            return None;
        }
        Some((col as usize, line as usize))
    }
}

/// Where each element sits on the grid, by index into the element slice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub cols: usize,
    pub from_coordinates: bool,
    positions: Vec<(usize, usize)>,
    slots: HashMap<(usize, usize), usize>,
}

impl Placement {
    /// Uses element coordinates when every element has one, they are unique
    /// and they fit the square; falls back to row-major order by index.
    pub fn compute(elements: &[ArrayElement]) -> Self {
        let cols = side_length(elements.len());
        let positions = coordinate_positions(elements, cols);
        let from_coordinates = positions.is_some();
        let positions = positions.unwrap_or_else(|| {
            (0..elements.len())
                .map(|index| (index % cols, index / cols))
                .collect()
        });
        let slots = positions
            .iter()
            .enumerate()
            .map(|(index, slot)| (*slot, index))
            .collect();
        Self {
            cols,
            from_coordinates,
            positions,
            slots,
        }
    }

    pub fn position(&self, index: usize) -> Option<(usize, usize)> {
        self.positions.get(index).copied()
    }

    pub fn element_at(&self, col: usize, row: usize) -> Option<usize> {
        self.slots.get(&(col, row)).copied()
    }
}

fn coordinate_positions(elements: &[ArrayElement], cols: usize) -> Option<Vec<(usize, usize)>> {
    if elements.is_empty() {
        return None;
    }
    let grids: Vec<_> = elements
        .iter()
        .map(|element| element.grid)
        .collect::<Option<_>>()?;
    let min_x = grids.iter().map(|pos| pos.x).min()?;
    let min_y = grids.iter().map(|pos| pos.y).min()?;
    let mut seen = std::collections::HashSet::with_capacity(grids.len());
    let mut positions = Vec::with_capacity(grids.len());
    for pos in grids {
        let col = usize::try_from(pos.x - min_x).ok()?;
        let row = usize::try_from(pos.y - min_y).ok()?;
        if col >= cols || row >= cols || !seen.insert((col, row)) {
            return None;
        }
        positions.push((col, row));
    }
    Some(positions)
}

/// Inferno stops, dark to bright. Luminance rises monotonically.
const RAMP: [(u8, u8, u8); 9] = [
    (0, 0, 4),
    (31, 12, 72),
    (87, 16, 110),
    (138, 34, 106),
    (188, 55, 84),
    (228, 90, 49),
    (249, 142, 9),
    (246, 215, 70),
    (252, 255, 164),
];

pub fn ramp_rgb(amplitude: f64) -> (u8, u8, u8) {
    let t = clamp_amplitude(amplitude) / AMPLITUDE_MAX;
    let scaled = t * (RAMP.len() - 1) as f64;
    let lower = (scaled.floor() as usize).min(RAMP.len() - 2);
    let frac = scaled - lower as f64;
    let (r0, g0, b0) = RAMP[lower];
    let (r1, g1, b1) = RAMP[lower + 1];
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * frac).round() as u8;
    (mix(r0, r1), mix(g0, g1), mix(b0, b1))
}

pub fn amplitude_color(amplitude: f64) -> Color {
    let (r, g, b) = ramp_rgb(amplitude);
    Color::Rgb(r, g, b)
}

pub fn cell_color(element: &ArrayElement, palette: &Palette) -> Color {
    match element.status {
        ElementStatus::Fault => palette.fault_cell,
        ElementStatus::Idle => palette.idle_cell,
        ElementStatus::Active => amplitude_color(element.amplitude),
    }
}

/// Readable text color on top of a cell background.
pub fn contrast_color(background: Color) -> Color {
    match background {
        Color::Rgb(r, g, b) if relative_luminance(r, g, b) > 0.45 => Color::Black,
        _ => Color::White,
    }
}

pub fn relative_luminance(r: u8, g: u8, b: u8) -> f64 {
    (0.2126 * r as f64 + 0.7152 * g as f64 + 0.0722 * b as f64) / 255.0
}

/// Box of `width` x `height` just below and right of the pointer, shifted to
/// stay inside `frame`.
pub fn overlay_rect(pointer: (u16, u16), width: u16, height: u16, frame: Rect) -> Rect {
    let width = width.min(frame.width);
    let height = height.min(frame.height);
    let max_x = frame.x + frame.width - width;
    let max_y = frame.y + frame.height - height;
    let mut x = pointer.0.saturating_add(2);
    let mut y = pointer.1.saturating_add(1);
    if x > max_x {
        x = pointer.0.saturating_sub(width + 1).max(frame.x).min(max_x);
    }
    if y > max_y {
        y = pointer.1.saturating_sub(height).max(frame.y).min(max_y);
    }
    Rect {
        x: x.max(frame.x),
        y: y.max(frame.y),
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pac_core::GridPos;

    fn elements(count: usize) -> Vec<ArrayElement> {
        (0..count as u64)
            .map(|id| ArrayElement::idle(id + 1, None))
            .collect()
    }

    #[test]
    fn side_length_is_ceil_sqrt() {
        assert_eq!(side_length(256), 16);
        assert_eq!(side_length(10), 4);
        assert_eq!(side_length(1), 1);
        assert_eq!(side_length(17), 5);
        assert_eq!(side_length(0), 16);
    }

    #[test]
    fn zero_viewport_is_skipped() {
        assert_eq!(fit(Rect::new(0, 0, 0, 40), 16), GridFit::Skip);
        assert_eq!(fit(Rect::new(0, 0, 80, 0), 16), GridFit::Skip);
        assert_eq!(fit(Rect::new(0, 0, 10, 4), 16), GridFit::TooSmall);
    }

    #[test]
    fn geometry_leaves_gutters_and_centers() {
        let GridFit::Fits(geometry) = fit(Rect::new(0, 0, 100, 34), 16) else {
            panic!("grid should fit");
        };
        assert_eq!((geometry.pitch_x, geometry.pitch_y), (4, 2));
        assert_eq!((geometry.cell_w, geometry.cell_h), (3, 1));
        assert_eq!(geometry.pitch_x * geometry.cols, 64);
        assert_eq!(geometry.origin_x, 18);
        assert_eq!(geometry.origin_y, 1);
    }

    #[test]
    fn resizing_recomputes_cells() {
        let GridFit::Fits(small) = fit(Rect::new(0, 0, 40, 20), 4) else {
            panic!("grid should fit");
        };
        let GridFit::Fits(large) = fit(Rect::new(0, 0, 160, 80), 4) else {
            panic!("grid should fit");
        };
        assert!(large.cell_w > small.cell_w);
        assert!(large.cell_h > small.cell_h);
    }

    #[test]
    fn hit_testing_is_per_cell() {
        let GridFit::Fits(geometry) = fit(Rect::new(0, 0, 100, 34), 16) else {
            panic!("grid should fit");
        };
        let rect = geometry.cell_rect(3, 2);
        assert_eq!(geometry.cell_at(rect.x, rect.y), Some((3, 2)));
        assert_eq!(geometry.cell_at(rect.x + rect.width - 1, rect.y), Some((3, 2)));
        // gutter right of the cell
        assert_eq!(geometry.cell_at(rect.x + rect.width, rect.y), None);
        // gutter row below the cell
        assert_eq!(geometry.cell_at(rect.x, rect.y + 1), None);
        assert_eq!(geometry.cell_at(0, 0), None);
        assert_eq!(geometry.cell_at(99, 33), None);
    }

    #[test]
    fn index_placement_is_row_major() {
        let placement = Placement::compute(&elements(10));
        assert_eq!(placement.cols, 4);
        assert!(!placement.from_coordinates);
        assert_eq!(placement.position(0), Some((0, 0)));
        assert_eq!(placement.position(5), Some((1, 1)));
        assert_eq!(placement.position(9), Some((1, 2)));
        assert_eq!(placement.element_at(1, 2), Some(9));
        assert_eq!(placement.element_at(3, 3), None);
    }

    #[test]
    fn coordinates_are_used_when_consistent() {
        let set: Vec<_> = (0..4u64)
            .map(|id| {
                ArrayElement::idle(
                    id,
                    Some(GridPos {
                        x: 10 + (3 - id as i64) % 2,
                        y: 20 + (3 - id as i64) / 2,
                    }),
                )
            })
            .collect();
        let placement = Placement::compute(&set);
        assert!(placement.from_coordinates);
        assert_eq!(placement.position(0), Some((1, 1)));
        assert_eq!(placement.position(3), Some((0, 0)));
    }

    #[test]
    fn inconsistent_coordinates_fall_back_to_index() {
        let mut set = elements(4);
        set[0].grid = Some(GridPos { x: 0, y: 0 });
        assert!(!Placement::compute(&set).from_coordinates);

        let duplicate: Vec<_> = (0..4u64)
            .map(|id| ArrayElement::idle(id, Some(GridPos { x: 0, y: 0 })))
            .collect();
        assert!(!Placement::compute(&duplicate).from_coordinates);

        let sparse: Vec<_> = (0..4u64)
            .map(|id| {
                ArrayElement::idle(
                    id,
                    Some(GridPos {
                        x: id as i64 * 10,
                        y: 0,
                    }),
                )
            })
            .collect();
        assert!(!Placement::compute(&sparse).from_coordinates);
    }

    #[test]
    fn zero_amplitude_is_the_ramp_start() {
        assert_eq!(ramp_rgb(0.0), RAMP[0]);
        assert_eq!(ramp_rgb(100.0), RAMP[RAMP.len() - 1]);
        assert_eq!(ramp_rgb(-5.0), RAMP[0]);
        assert_eq!(ramp_rgb(250.0), RAMP[RAMP.len() - 1]);
    }

    #[test]
    fn ramp_luminance_is_monotonic() {
        let mut previous = -1.0;
        for amplitude in 0..=100 {
            let (r, g, b) = ramp_rgb(amplitude as f64);
            let luminance = relative_luminance(r, g, b);
            assert!(
                luminance >= previous,
                "luminance dropped at amplitude {amplitude}"
            );
            previous = luminance;
        }
    }

    #[test]
    fn cell_colors_follow_status() {
        let palette = crate::theme::ThemeKind::Default.palette();
        let mut element = ArrayElement::idle(1, None);
        assert_eq!(cell_color(&element, &palette), palette.idle_cell);
        element.status = ElementStatus::Fault;
        assert_eq!(cell_color(&element, &palette), palette.fault_cell);
        element.status = ElementStatus::Active;
        element.amplitude = 0.0;
        assert_eq!(cell_color(&element, &palette), Color::Rgb(0, 0, 4));
        assert_ne!(cell_color(&element, &palette), palette.idle_cell);
    }

    #[test]
    fn overlay_stays_inside_the_frame() {
        let frame = Rect::new(0, 0, 80, 24);
        let near = overlay_rect((10, 5), 20, 6, frame);
        assert_eq!((near.x, near.y), (12, 6));

        let corner = overlay_rect((79, 23), 20, 6, frame);
        assert!(corner.x + corner.width <= 80);
        assert!(corner.y + corner.height <= 24);

        let oversized = overlay_rect((5, 5), 200, 60, frame);
        assert_eq!(oversized, frame);
    }
}
