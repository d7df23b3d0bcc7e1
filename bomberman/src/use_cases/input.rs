// Local input: where the locally controlled participant's control record
// comes from each frame.

use crate::domain::snapshot::ControlRecord;
use std::collections::VecDeque;

pub trait InputSource: Send {
    fn poll(&mut self) -> ControlRecord;
}

/// No device attached; every button released.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleInput;

impl InputSource for IdleInput {
    fn poll(&mut self) -> ControlRecord {
        ControlRecord::default()
    }
}

/// Replays a fixed list of frames, then idles.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    frames: VecDeque<ControlRecord>,
}

impl ScriptedInput {
    pub fn new(frames: impl IntoIterator<Item = ControlRecord>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> ControlRecord {
        self.frames.pop_front().unwrap_or_default()
    }
}
