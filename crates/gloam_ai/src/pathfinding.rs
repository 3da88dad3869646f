//! A* pathfinding over a rasterized occupancy grid.
//!
//! The grid is rebuilt from static colliders on every request. Movement is
//! 4-directional with unit cost and a Manhattan heuristic. "No route" is an
//! empty path, never an error.

use gloam_core::math::{Aabb, Vec2};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Integer cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: GridPos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    fn neighbours(self) -> [GridPos; 4] {
        [
            GridPos::new(self.x + 1, self.y),
            GridPos::new(self.x - 1, self.y),
            GridPos::new(self.x, self.y + 1),
            GridPos::new(self.x, self.y - 1),
        ]
    }
}

/// Mapping between world space and grid cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub origin: Vec2,
    pub cell_size: f32,
    pub width: usize,
    pub height: usize,
}

impl GridLayout {
    /// Cover `bounds` with square cells, rounding the last row/column up.
    pub fn from_bounds(bounds: Aabb, cell_size: f32) -> Self {
        let cell_size = cell_size.max(f32::EPSILON);
        Self {
            origin: bounds.min,
            cell_size,
            width: (bounds.width() / cell_size).ceil().max(0.0) as usize,
            height: (bounds.height() / cell_size).ceil().max(0.0) as usize,
        }
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    /// Cell containing `point`. May be out of bounds.
    pub fn cell_of(&self, point: Vec2) -> GridPos {
        let local = (point - self.origin) / self.cell_size;
        GridPos::new(local.x.floor() as i32, local.y.floor() as i32)
    }

    pub fn center_of(&self, pos: GridPos) -> Vec2 {
        self.origin + (Vec2::new(pos.x as f32, pos.y as f32) + 0.5) * self.cell_size
    }

    pub fn cell_rect(&self, pos: GridPos) -> Aabb {
        let min = self.origin + Vec2::new(pos.x as f32, pos.y as f32) * self.cell_size;
        Aabb::new(min, min + Vec2::splat(self.cell_size))
    }
}

/// `width x height` blocked flags, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    width: usize,
    height: usize,
    blocked: Vec<bool>,
}

impl OccupancyGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            blocked: vec![false; width * height],
        }
    }

    /// Mark every cell a collider overlaps.
    pub fn rasterize<'a>(layout: &GridLayout, colliders: impl IntoIterator<Item = &'a Aabb>) -> Self {
        let mut grid = Self::new(layout.width, layout.height);
        for collider in colliders {
            let lo = layout.cell_of(collider.min);
            let hi = layout.cell_of(collider.max);
            for y in lo.y.max(0)..=hi.y.min(layout.height as i32 - 1) {
                for x in lo.x.max(0)..=hi.x.min(layout.width as i32 - 1) {
                    let pos = GridPos::new(x, y);
                    if layout.cell_rect(pos).overlaps(collider) {
                        grid.set_blocked(pos, true);
                    }
                }
            }
        }
        grid
    }

    /// Parse rows of `.` (open) and `#` (blocked). Handy for tests and tools.
    pub fn from_ascii(rows: &str) -> Self {
        let lines: Vec<&str> = rows
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let mut grid = Self::new(width, lines.len());
        for (y, line) in lines.iter().enumerate() {
            for (x, ch) in line.chars().enumerate() {
                if ch == '#' {
                    grid.set_blocked(GridPos::new(x as i32, y as i32), true);
                }
            }
        }
        grid
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 {
            return None;
        }
        let (x, y) = (pos.x as usize, pos.y as usize);
        (x < self.width && y < self.height).then_some(y * self.width + x)
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        self.index(pos).is_some()
    }

    /// Out-of-bounds cells read as blocked.
    pub fn is_blocked(&self, pos: GridPos) -> bool {
        self.index(pos).map_or(true, |i| self.blocked[i])
    }

    pub fn set_blocked(&mut self, pos: GridPos, blocked: bool) {
        if let Some(i) = self.index(pos) {
            self.blocked[i] = blocked;
        }
    }
}

/// Open-set entry. `seq` breaks `f` ties in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenItem {
    pos: GridPos,
    f: u32,
    g: u32,
    seq: u64,
}

impl Ord for OpenItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other.f.cmp(&self.f).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest 4-connected path from `start` to `goal`, both inclusive.
///
/// Empty when either end is out of bounds or blocked, or when the goal is
/// unreachable. `start == goal` yields a single node.
pub fn find_path(grid: &OccupancyGrid, start: GridPos, goal: GridPos) -> Vec<GridPos> {
    let (Some(start_i), Some(goal_i)) = (grid.index(start), grid.index(goal)) else {
        return Vec::new();
    };
    if grid.blocked[start_i] || grid.blocked[goal_i] {
        return Vec::new();
    }
    if start == goal {
        return vec![start];
    }

    let cells = grid.width * grid.height;
    let mut g_score = vec![u32::MAX; cells];
    let mut came_from: Vec<Option<usize>> = vec![None; cells];
    let mut open = BinaryHeap::new();
    let mut seq = 0u64;

    g_score[start_i] = 0;
    open.push(OpenItem {
        pos: start,
        f: start.manhattan(goal),
        g: 0,
        seq,
    });

    while let Some(current) = open.pop() {
        let Some(current_i) = grid.index(current.pos) else {
            continue;
        };
        if current_i == goal_i {
            return reconstruct(grid, &came_from, goal_i);
        }
        // Stale entry superseded by a cheaper one.
        if current.g > g_score[current_i] {
            continue;
        }

        for next in current.pos.neighbours() {
            let Some(next_i) = grid.index(next) else {
                continue;
            };
            if grid.blocked[next_i] {
                continue;
            }
            let tentative = current.g + 1;
            if tentative < g_score[next_i] {
                g_score[next_i] = tentative;
                came_from[next_i] = Some(current_i);
                seq += 1;
                open.push(OpenItem {
                    pos: next,
                    f: tentative + next.manhattan(goal),
                    g: tentative,
                    seq,
                });
            }
        }
    }

    Vec::new()
}

fn reconstruct(grid: &OccupancyGrid, came_from: &[Option<usize>], goal_i: usize) -> Vec<GridPos> {
    let to_pos = |i: usize| GridPos::new((i % grid.width) as i32, (i / grid.width) as i32);
    let mut path = vec![to_pos(goal_i)];
    let mut current = goal_i;
    while let Some(prev) = came_from[current] {
        path.push(to_pos(prev));
        current = prev;
    }
    path.reverse();
    path
}

/// Rasterize `colliders` over `bounds` and path between two world points.
/// Waypoints are cell centers, starting with the cell containing `from`.
pub fn find_world_path<'a>(
    bounds: Aabb,
    cell_size: f32,
    colliders: impl IntoIterator<Item = &'a Aabb>,
    from: Vec2,
    to: Vec2,
) -> Vec<Vec2> {
    let layout = GridLayout::from_bounds(bounds, cell_size);
    let (start, goal) = (layout.cell_of(from), layout.cell_of(to));
    if !layout.in_bounds(start) || !layout.in_bounds(goal) {
        tracing::trace!(?from, ?to, "path endpoint outside level bounds");
        return Vec::new();
    }
    let grid = OccupancyGrid::rasterize(&layout, colliders);
    find_path(&grid, start, goal)
        .into_iter()
        .map(|pos| layout.center_of(pos))
        .collect()
}
