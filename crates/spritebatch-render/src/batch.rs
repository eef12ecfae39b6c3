//! Per-frame grouping of draw requests by sprite.
//!
//! Grouping happens as draws are registered, so submission streams straight
//! out of the buckets without a sort pass.

use glam::Vec2;

use crate::error::{Result, SpriteRenderError};
use crate::sprite::{BoundingBox, SpriteId};

/// One sprite placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRequest {
    pub position: Vec2,
    pub scale: Vec2,
    /// Rotation around Z in radians.
    pub rotation: f32,
    /// UV window sampled from the sprite's texture.
    pub bounds: BoundingBox,
}

impl DrawRequest {
    pub fn new(position: Vec2, scale: Vec2, rotation: f32, bounds: BoundingBox) -> Self {
        Self {
            position,
            scale,
            rotation,
            bounds,
        }
    }
}

/// Draw requests for one sprite, in registration order.
///
/// The request storage is reserved the first time the slot is claimed, or
/// up front through [`BatchTable::reserve_all`], and is only cleared, never
/// freed, afterwards.
#[derive(Debug, Default)]
pub struct Batch {
    sprite: Option<SpriteId>,
    requests: Vec<DrawRequest>,
}

impl Batch {
    pub fn sprite(&self) -> Option<SpriteId> {
        self.sprite
    }

    pub fn requests(&self) -> &[DrawRequest] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn bind(&mut self, sprite: SpriteId, capacity: usize) {
        self.sprite = Some(sprite);
        self.requests.reserve_exact(capacity);
    }

    fn release(&mut self) {
        self.sprite = None;
        self.requests.clear();
    }
}

/// Fixed pool of batches plus the frame's draw counters.
///
/// Slots `0..active_count()` are bound to pairwise distinct sprites, in the
/// order each sprite was first drawn this frame.
#[derive(Debug)]
pub struct BatchTable {
    slots: Vec<Batch>,
    active: usize,
    draw_count: usize,
    batch_capacity: usize,
    draw_limit: usize,
}

impl BatchTable {
    /// `max_batches` slots of `max_draws_per_batch` requests each, accepting
    /// at most `draw_limit` requests per frame.
    pub fn new(max_batches: usize, max_draws_per_batch: usize, draw_limit: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(Batch::default).take(max_batches).collect(),
            active: 0,
            draw_count: 0,
            batch_capacity: max_draws_per_batch,
            draw_limit,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Reserve full request storage in every slot now, so claiming a slot
    /// never allocates.
    pub fn reserve_all(&mut self) {
        for batch in &mut self.slots {
            batch.requests.reserve_exact(self.batch_capacity);
        }
    }

    /// Request storage currently reserved across all slots.
    pub fn reserved_requests(&self) -> usize {
        self.slots.iter().map(|batch| batch.requests.capacity()).sum()
    }

    pub fn batch_capacity(&self) -> usize {
        self.batch_capacity
    }

    pub fn draw_limit(&self) -> usize {
        self.draw_limit
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Requests registered this frame across all batches.
    pub fn draw_count(&self) -> usize {
        self.draw_count
    }

    /// Batches bound this frame, in slot order.
    pub fn active(&self) -> &[Batch] {
        &self.slots[..self.active]
    }

    /// Slot index holding `sprite`, scanning only the active slots.
    pub fn find(&self, sprite: SpriteId) -> Option<usize> {
        self.active()
            .iter()
            .position(|batch| batch.sprite == Some(sprite))
    }

    /// Fail if `count` more requests would go over the frame's draw limit.
    pub fn ensure_draw_capacity(&self, count: usize) -> Result<()> {
        if self.draw_count + count > self.draw_limit {
            return Err(SpriteRenderError::DrawLimitExceeded {
                limit: self.draw_limit,
            });
        }
        Ok(())
    }

    /// Append one request to `sprite`'s batch, claiming a new slot on the
    /// sprite's first draw this frame. Nothing changes on error.
    pub fn register(&mut self, sprite: SpriteId, request: DrawRequest) -> Result<()> {
        self.register_all(sprite, std::slice::from_ref(&request))
    }

    /// Append `requests` in order, all or nothing.
    pub fn register_all(&mut self, sprite: SpriteId, requests: &[DrawRequest]) -> Result<()> {
        self.register_with(sprite, requests.iter().copied())
    }

    /// Append every request produced by `requests`, all or nothing.
    ///
    /// Every capacity check runs against the iterator's reported length before
    /// the first request is stored. The draw count grows by the number of
    /// requests actually stored.
    pub fn register_with<I>(&mut self, sprite: SpriteId, requests: I) -> Result<()>
    where
        I: IntoIterator<Item = DrawRequest>,
        I::IntoIter: ExactSizeIterator,
    {
        let requests = requests.into_iter();
        let count = requests.len();
        self.ensure_draw_capacity(count)?;
        if count == 0 {
            return Ok(());
        }

        let slot = match self.find(sprite) {
            Some(slot) => slot,
            None if self.active == self.slots.len() => {
                return Err(SpriteRenderError::BatchLimitExceeded {
                    limit: self.slots.len(),
                });
            }
            None => self.active,
        };

        if self.slots[slot].len() + count > self.batch_capacity {
            return Err(SpriteRenderError::BatchFull {
                sprite,
                capacity: self.batch_capacity,
            });
        }

        if slot == self.active {
            self.slots[slot].bind(sprite, self.batch_capacity);
            self.active += 1;
        }

        let batch = &mut self.slots[slot];
        let before = batch.requests.len();
        batch.requests.extend(requests.take(count));
        let written = batch.requests.len() - before;
        debug_assert_eq!(written, count, "iterator yielded fewer requests than its length");
        self.draw_count += written;
        Ok(())
    }

    /// Return every slot to the unbound state. Request storage is kept.
    pub fn reset(&mut self) {
        for batch in &mut self.slots[..self.active] {
            batch.release();
        }
        self.active = 0;
        self.draw_count = 0;
    }
}
