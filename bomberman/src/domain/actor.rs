// Spatial state shared by every game object, embedded by value.

use super::grid::{TILE_SIZE, tile_center, tile_of, tile_origin};
use glam::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    // Positioned by its centre.
    Circle { radius: f32 },
    // Positioned by its top-left corner.
    Rect { width: f32, height: f32 },
}

/// Looping frame counter for idle and walk cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationState {
    pub frame_count: u32,
    pub ticks_per_frame: u32,
    tick: u32,
}

impl AnimationState {
    pub fn new(frame_count: u32, ticks_per_frame: u32) -> Self {
        Self {
            frame_count: frame_count.max(1),
            ticks_per_frame: ticks_per_frame.max(1),
            tick: 0,
        }
    }

    pub fn still() -> Self {
        Self::new(1, 1)
    }

    pub fn advance(&mut self) {
        self.tick = (self.tick + 1) % (self.frame_count * self.ticks_per_frame);
    }

    pub fn frame(&self) -> u32 {
        self.tick / self.ticks_per_frame
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialActor {
    pub position: Vec2,
    pub shape: Shape,
    pub animation: AnimationState,
}

impl SpatialActor {
    pub fn circle(center: Vec2, radius: f32, animation: AnimationState) -> Self {
        Self {
            position: center,
            shape: Shape::Circle { radius },
            animation,
        }
    }

    /// A circle sitting in the middle of a tile.
    pub fn centered_on(tile_x: i32, tile_y: i32, radius: f32, animation: AnimationState) -> Self {
        Self::circle(tile_center(tile_x, tile_y), radius, animation)
    }

    /// A rectangle covering exactly one tile.
    pub fn tile_block(tile_x: i32, tile_y: i32, animation: AnimationState) -> Self {
        Self {
            position: tile_origin(tile_x, tile_y),
            shape: Shape::Rect {
                width: TILE_SIZE,
                height: TILE_SIZE,
            },
            animation,
        }
    }

    pub fn center(&self) -> Vec2 {
        match self.shape {
            Shape::Circle { .. } => self.position,
            Shape::Rect { width, height } => self.position + Vec2::new(width, height) / 2.0,
        }
    }

    /// Tile under the actor's centre.
    pub fn tile(&self) -> (i32, i32) {
        tile_of(self.center())
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.position += delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_animation_reaches_last_frame_then_it_wraps_to_the_first() {
        let mut anim = AnimationState::new(3, 2);
        let mut frames = Vec::new();
        for _ in 0..7 {
            frames.push(anim.frame());
            anim.advance();
        }
        assert_eq!(frames, vec![0, 0, 1, 1, 2, 2, 0]);
    }

    #[test]
    fn when_actor_is_a_tile_block_then_its_tile_uses_the_centre() {
        let block = SpatialActor::tile_block(3, 5, AnimationState::still());
        assert_eq!(block.position, Vec2::new(48.0, 80.0));
        assert_eq!(block.tile(), (3, 5));

        let bomb = SpatialActor::centered_on(3, 5, 7.0, AnimationState::still());
        assert_eq!(bomb.position, Vec2::new(56.0, 88.0));
        assert_eq!(bomb.tile(), (3, 5));
    }
}
