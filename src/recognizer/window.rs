use std::collections::VecDeque;

use crate::observation::{EventKind, TouchSample};

pub const DEFAULT_MAX_OBSERVATIONS: usize = 50;

/// Per-pointer sample history with shared decay: once any pointer exceeds
/// the cap, the oldest sample is dropped from every non-empty lane.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationWindow {
    lanes: Vec<(u8, VecDeque<TouchSample>)>,
    max_observations: usize,
}

impl ObservationWindow {
    pub fn new(pointers: &[u8], max_observations: usize) -> Self {
        Self {
            lanes: pointers
                .iter()
                .map(|pointer| (*pointer, VecDeque::with_capacity(max_observations + 1)))
                .collect(),
            max_observations: max_observations.max(1),
        }
    }

    pub fn max_observations(&self) -> usize {
        self.max_observations
    }

    pub fn accepts(&self, pointer: u8) -> bool {
        self.lanes.iter().any(|(id, _)| *id == pointer)
    }

    pub fn pointers(&self) -> impl Iterator<Item = u8> + '_ {
        self.lanes.iter().map(|(id, _)| *id)
    }

    /// Appends a sample to its pointer's lane. Returns `false` when the
    /// pointer is not accepted.
    pub fn push(&mut self, sample: TouchSample) -> bool {
        let Some(index) = self
            .lanes
            .iter()
            .position(|(id, _)| *id == sample.pointer_id)
        else {
            return false;
        };
        self.lanes[index].1.push_back(sample);
        while self.lanes[index].1.len() > self.max_observations {
            for (_, lane) in &mut self.lanes {
                lane.pop_front();
            }
        }
        // `samples` hands out a single slice per lane.
        for (_, lane) in &mut self.lanes {
            lane.make_contiguous();
        }
        true
    }

    pub fn samples(&self, pointer: u8) -> &[TouchSample] {
        self.lanes
            .iter()
            .find(|(id, _)| *id == pointer)
            .map(|(_, lane)| lane.as_slices().0)
            .unwrap_or(&[])
    }

    pub fn event_kinds(&self, pointer: u8) -> Vec<EventKind> {
        self.samples(pointer)
            .iter()
            .map(|sample| sample.kind)
            .collect()
    }

    /// Length of the longest lane.
    pub fn observation_count(&self) -> usize {
        self.lanes.iter().map(|(_, lane)| lane.len()).max().unwrap_or(0)
    }

    pub fn observed_pointer_count(&self) -> usize {
        self.lanes.iter().filter(|(_, lane)| !lane.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.iter().all(|(_, lane)| lane.is_empty())
    }

    pub fn clear(&mut self) {
        for (_, lane) in &mut self.lanes {
            lane.clear();
        }
    }
}
