use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::infra::{SimTime, Vec2};
use crate::state::ItemId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceNodeId(pub usize);

/// Shelf tile that holds one overlay item and refills it after a random delay.
#[derive(Debug, Clone)]
pub struct ResourceNode {
    pub id: ResourceNodeId,
    pub position: Vec2,
    overlay: ItemId,
    is_ready: bool,
    min_delay: f64,
    max_delay: f64,
    regen_deadline: Option<SimTime>,
}

impl ResourceNode {
    pub fn new(
        id: ResourceNodeId,
        position: Vec2,
        overlay: ItemId,
        min_delay: f64,
        max_delay: f64,
    ) -> Result<Self, ConfigError> {
        if !(min_delay >= 0.0) {
            return Err(ConfigError::invalid(
                "min_regen_delay",
                format!("must be non-negative, got {}", min_delay),
            ));
        }
        if !(max_delay >= min_delay) {
            return Err(ConfigError::invalid(
                "max_regen_delay",
                format!("must be >= min_regen_delay ({}), got {}", min_delay, max_delay),
            ));
        }
        Ok(Self {
            id,
            position,
            overlay,
            is_ready: false,
            min_delay,
            max_delay,
            regen_deadline: None,
        })
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready
    }

    pub fn overlay(&self) -> ItemId {
        self.overlay
    }

    pub fn regen_deadline(&self) -> Option<SimTime> {
        self.regen_deadline
    }

    /// Swaps in the item the tile shows once it next regenerates.
    pub fn set_overlay(&mut self, overlay: ItemId) {
        self.overlay = overlay;
    }

    /// Marks the node ready immediately (initial configuration only).
    pub fn make_ready(&mut self) {
        self.is_ready = true;
        self.regen_deadline = None;
    }

    /// Samples a delay and sets the deadline relative to `now`. Any earlier
    /// deadline is superseded.
    pub fn begin_regeneration<R: Rng + ?Sized>(&mut self, now: SimTime, rng: &mut R) -> SimTime {
        let delay = if self.max_delay > self.min_delay {
            rng.random_range(self.min_delay..=self.max_delay)
        } else {
            self.min_delay
        };
        let deadline = now + delay;
        self.is_ready = false;
        self.regen_deadline = Some(deadline);
        trace!(
            "node {:?} regenerates in {:.2}s (at t={:.2})",
            self.id, delay, deadline
        );
        deadline
    }

    /// Consumes the overlay if ready. Returns the new regeneration deadline,
    /// or `None` when the node was not ready (state unchanged).
    pub fn try_consume<R: Rng + ?Sized>(&mut self, now: SimTime, rng: &mut R) -> Option<SimTime> {
        if !self.is_ready {
            return None;
        }
        debug!("overlay collected from node {:?}", self.id);
        Some(self.begin_regeneration(now, rng))
    }

    /// Deferred-callback target. Only flips to ready once the live deadline
    /// has actually elapsed.
    pub fn on_regenerate(&mut self, now: SimTime) -> bool {
        match self.regen_deadline {
            Some(deadline) if now >= deadline => {
                self.is_ready = true;
                self.regen_deadline = None;
                debug!("node {:?} overlay ready at t={:.2}", self.id, now);
                true
            }
            _ => false,
        }
    }
}
