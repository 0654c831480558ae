use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::controller::{ActionCode, Command};
use crate::infra::Vec2;
use crate::planners::{DriverContext, IntentSource};

/// Raw input sampled once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InputFrame {
    pub horizontal: f32,
    pub vertical: f32,
    pub pick: bool,
    pub place: bool,
}

impl InputFrame {
    pub fn axes(horizontal: f32, vertical: f32) -> Self {
        Self {
            horizontal,
            vertical,
            ..Default::default()
        }
    }

    /// Pick wins when both keys are held.
    pub fn action(&self) -> ActionCode {
        if self.pick {
            ActionCode::Pick
        } else if self.place {
            ActionCode::Place
        } else {
            ActionCode::None
        }
    }
}

/// Source of input frames (keyboard, gamepad, replay file, test script).
pub trait InputPoller: Send {
    fn poll(&mut self) -> InputFrame;
}

/// Plays back a fixed script, then idles.
#[derive(Debug, Clone, Default)]
pub struct QueuedInput {
    frames: VecDeque<InputFrame>,
}

impl QueuedInput {
    pub fn new(frames: impl IntoIterator<Item = InputFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn push(&mut self, frame: InputFrame) {
        self.frames.push_back(frame);
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl InputPoller for QueuedInput {
    fn poll(&mut self) -> InputFrame {
        self.frames.pop_front().unwrap_or_default()
    }
}

/// Latest frame written by another thread, e.g. a window event loop.
#[derive(Debug, Clone, Default)]
pub struct SharedInput {
    frame: Arc<Mutex<InputFrame>>,
}

impl SharedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, frame: InputFrame) {
        if let Ok(mut current) = self.frame.lock() {
            *current = frame;
        }
    }
}

impl InputPoller for SharedInput {
    fn poll(&mut self) -> InputFrame {
        self.frame.lock().map(|frame| *frame).unwrap_or_default()
    }
}

pub struct PlayerDriver<P: InputPoller> {
    poller: P,
}

impl<P: InputPoller> PlayerDriver<P> {
    pub fn new(poller: P) -> Self {
        Self { poller }
    }
}

impl<P: InputPoller> IntentSource for PlayerDriver<P> {
    fn name(&self) -> &str {
        "player"
    }

    fn decide(&mut self, _ctx: &DriverContext<'_>, _rng: &mut StdRng) -> Command {
        let frame = self.poller.poll();
        Command::steer(Vec2::new(frame.horizontal, frame.vertical), frame.action())
    }
}
