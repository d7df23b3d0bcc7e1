// Uniform hash grid over every collidable entity, rebuilt when a tick
// resolves collisions.

use super::actor::{Shape, SpatialActor};
use super::grid::TILE_SIZE;
use glam::Vec2;
use std::collections::HashMap;

// Overlaps smaller than this count as touching, not colliding.
const CONTACT_EPSILON: f32 = 1e-4;

/// What a spatial index entry stands for; indices point into the world's
/// entity sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Player(usize),
    Monster(usize),
    Bomb(usize),
    Box(usize),
    Explosion(usize),
    Terrain {
        tile_x: i32,
        tile_y: i32,
        destroyable: bool,
    },
    Effect(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub kind: EntityKind,
    /// Minimum translation that moves the queried shape out of the entry.
    pub separation: Vec2,
    // Geometry of the entry, for re-checking after earlier pushes.
    pub position: Vec2,
    pub shape: Shape,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    kind: EntityKind,
    position: Vec2,
    shape: Shape,
}

#[derive(Debug, Default)]
pub struct SpatialIndex {
    cells: HashMap<(i32, i32), Vec<usize>>,
    entries: Vec<Entry>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, kind: EntityKind, actor: &SpatialActor) {
        let index = self.entries.len();
        self.entries.push(Entry {
            kind,
            position: actor.position,
            shape: actor.shape,
        });
        for cell in covered_cells(actor.position, actor.shape) {
            self.cells.entry(cell).or_default().push(index);
        }
    }

    /// Every entry overlapping `shape` at `position`, in insertion order.
    pub fn contacts(&self, shape: Shape, position: Vec2) -> Vec<Contact> {
        let mut seen: Vec<usize> = Vec::new();
        for cell in covered_cells(position, shape) {
            if let Some(bucket) = self.cells.get(&cell) {
                seen.extend(bucket.iter().copied());
            }
        }
        seen.sort_unstable();
        seen.dedup();

        seen.into_iter()
            .filter_map(|i| {
                let entry = &self.entries[i];
                separation(position, shape, entry.position, entry.shape).map(|separation| {
                    Contact {
                        kind: entry.kind,
                        separation,
                        position: entry.position,
                        shape: entry.shape,
                    }
                })
            })
            .collect()
    }
}

fn bounds(position: Vec2, shape: Shape) -> (Vec2, Vec2) {
    match shape {
        Shape::Circle { radius } => (position - Vec2::splat(radius), position + Vec2::splat(radius)),
        Shape::Rect { width, height } => (position, position + Vec2::new(width, height)),
    }
}

fn covered_cells(position: Vec2, shape: Shape) -> impl Iterator<Item = (i32, i32)> {
    let (min, max) = bounds(position, shape);
    let (x0, y0) = ((min.x / TILE_SIZE).floor() as i32, (min.y / TILE_SIZE).floor() as i32);
    let (x1, y1) = ((max.x / TILE_SIZE).floor() as i32, (max.y / TILE_SIZE).floor() as i32);
    (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| (x, y)))
}

/// Vector that pushes shape `a` out of shape `b`, or `None` when they do not
/// overlap.
pub fn separation(a_pos: Vec2, a: Shape, b_pos: Vec2, b: Shape) -> Option<Vec2> {
    match (a, b) {
        (Shape::Circle { radius: ra }, Shape::Circle { radius: rb }) => {
            let delta = a_pos - b_pos;
            let dist = delta.length();
            let overlap = ra + rb - dist;
            if overlap <= CONTACT_EPSILON {
                return None;
            }
            let normal = if dist > CONTACT_EPSILON {
                delta / dist
            } else {
                Vec2::X
            };
            Some(normal * overlap)
        }
        (Shape::Circle { radius }, Shape::Rect { width, height }) => {
            circle_out_of_rect(a_pos, radius, b_pos, b_pos + Vec2::new(width, height))
        }
        (Shape::Rect { width, height }, Shape::Circle { radius }) => {
            circle_out_of_rect(b_pos, radius, a_pos, a_pos + Vec2::new(width, height)).map(|v| -v)
        }
        (
            Shape::Rect {
                width: wa,
                height: ha,
            },
            Shape::Rect {
                width: wb,
                height: hb,
            },
        ) => {
            let (a_min, a_max) = (a_pos, a_pos + Vec2::new(wa, ha));
            let (b_min, b_max) = (b_pos, b_pos + Vec2::new(wb, hb));
            let overlap_x = a_max.x.min(b_max.x) - a_min.x.max(b_min.x);
            let overlap_y = a_max.y.min(b_max.y) - a_min.y.max(b_min.y);
            if overlap_x <= CONTACT_EPSILON || overlap_y <= CONTACT_EPSILON {
                return None;
            }
            let a_center = (a_min + a_max) / 2.0;
            let b_center = (b_min + b_max) / 2.0;
            if overlap_x < overlap_y {
                let sign = if a_center.x < b_center.x { -1.0 } else { 1.0 };
                Some(Vec2::new(sign * overlap_x, 0.0))
            } else {
                let sign = if a_center.y < b_center.y { -1.0 } else { 1.0 };
                Some(Vec2::new(0.0, sign * overlap_y))
            }
        }
    }
}

fn circle_out_of_rect(center: Vec2, radius: f32, min: Vec2, max: Vec2) -> Option<Vec2> {
    let closest = center.clamp(min, max);
    let delta = center - closest;
    let dist = delta.length();

    if dist > CONTACT_EPSILON {
        let overlap = radius - dist;
        if overlap <= CONTACT_EPSILON {
            return None;
        }
        return Some(delta / dist * overlap);
    }

    // Centre inside the rectangle: leave through the nearest face.
    let faces = [
        (center.x - min.x, Vec2::new(-(center.x - min.x + radius), 0.0)),
        (max.x - center.x, Vec2::new(max.x - center.x + radius, 0.0)),
        (center.y - min.y, Vec2::new(0.0, -(center.y - min.y + radius))),
        (max.y - center.y, Vec2::new(0.0, max.y - center.y + radius)),
    ];
    faces
        .into_iter()
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, push)| push)
}
