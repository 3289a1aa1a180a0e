// SPDX-License-Identifier: MIT OR Apache-2.0
//! Time and section queries over a linked section table.
//!
//! Live links may contain cycles when a preview loops, so every walk here is
//! guarded by a visited set or a jump budget.

use crate::loop_graph::partition_chains;
use crate::section::{NextSectionResolver, SectionTable};

/// Bias added to the normalized time before picking the current frame, so a
/// time sitting a hair below a frame boundary counts as that frame.
pub const DEFAULT_STEP_BIAS: f32 = 1.0e-4;

/// Direction of a single frame step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    /// One frame later
    Forward,
    /// One frame earlier
    Backward,
}

/// Time one frame away from `current_time`, snapped to the frame grid.
///
/// The result is clamped to `[0, total_length]`. Compare it with
/// `current_time` to find out whether any movement happened.
pub fn quantized_step(current_time: f32, total_length: f32, num_frames: u32, direction: StepDirection) -> f32 {
    quantized_step_with_bias(current_time, total_length, num_frames, direction, DEFAULT_STEP_BIAS)
}

/// [`quantized_step`] with an explicit frame bias
pub fn quantized_step_with_bias(
    current_time: f32,
    total_length: f32,
    num_frames: u32,
    direction: StepDirection,
    bias: f32,
) -> f32 {
    if total_length <= 0.0 {
        return 0.0;
    }
    if num_frames == 0 {
        return current_time.clamp(0.0, total_length);
    }

    let frames = num_frames as f32;
    let frame = ((current_time / total_length + bias) * frames).floor() as i64;
    let frame = match direction {
        StepDirection::Forward => frame + 1,
        StepDirection::Backward => frame - 1,
    }
    .clamp(0, i64::from(num_frames));

    total_length * frame as f32 / frames
}

/// Result of advancing a playback position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advance {
    /// New position on the montage timeline
    pub time: f32,
    /// Playback ran into a section with nowhere to go
    pub finished: bool,
}

/// Read-only queries over a section table
#[derive(Debug, Clone, Copy)]
pub struct PlaybackCursor<'a> {
    table: &'a SectionTable,
}

impl<'a> PlaybackCursor<'a> {
    /// Create a cursor over `table`
    pub fn new(table: &'a SectionTable) -> Self {
        Self { table }
    }

    /// Index of the section containing `time`.
    ///
    /// Times before every section map to the first one, times past the end
    /// (or inside a gap) map to the closest section starting before them.
    /// Only `None` for an empty table.
    pub fn section_index_at(&self, time: f32) -> Option<usize> {
        if self.table.is_empty() {
            return None;
        }
        if let Some(index) = self.table.iter().position(|section| section.contains(time)) {
            return Some(index);
        }

        let last_started = self
            .table
            .iter()
            .enumerate()
            .filter(|(_, section)| section.start_time <= time)
            .max_by(|(_, a), (_, b)| a.start_time.total_cmp(&b.start_time))
            .map(|(index, _)| index);
        Some(last_started.unwrap_or(0))
    }

    /// Section containing `time` and the offset into it
    pub fn position_in_section(&self, time: f32) -> Option<(usize, f32)> {
        let index = self.section_index_at(time)?;
        let section = self.table.section_at(index).ok()?;
        Some((index, (time - section.start_time).max(0.0)))
    }

    /// First section, in montage order, whose chain of live links reaches `target`.
    ///
    /// Sections are split into disjoint chains in table order and the chain
    /// reaching `target` in the fewest steps wins. Falls back to `target`
    /// itself when nothing reaches it.
    pub fn first_section_mapping_to(&self, target: usize) -> usize {
        let mut best_distance = usize::MAX;
        let mut result = target;

        for chain in partition_chains(&self.table.links()) {
            if let Some(distance) = chain.distance_to(target) {
                if distance < best_distance {
                    best_distance = distance;
                    result = chain.start;
                }
            }
        }

        result
    }

    /// Last section reached when playing on from `start`.
    ///
    /// Walks `resolver` until it yields nothing or revisits a section.
    pub fn last_reachable_section<R>(&self, start: usize, resolver: &R) -> usize
    where
        R: NextSectionResolver + ?Sized,
    {
        let mut visited = vec![false; self.table.len()];
        let mut result = start;
        let mut current = Some(start);

        while let Some(index) = current {
            if index >= visited.len() || visited[index] {
                break;
            }
            visited[index] = true;
            result = index;
            current = resolver.next_section(index);
        }

        result
    }

    /// Move `time` by `delta`, following live links across section boundaries.
    ///
    /// Forward movement past a section end continues at the start of its next
    /// section; backward movement past a section start continues at the end of
    /// the section linking to it. With no link to follow, playback stops at the
    /// section boundary and the result is marked finished.
    ///
    /// Coming back to a section already entered means the links loop, so the
    /// time left is reduced modulo the length of that loop. A non-finite
    /// `time` or `delta` leaves the position where it is.
    pub fn advance(&self, time: f32, delta: f32) -> Advance {
        if !time.is_finite() || !delta.is_finite() {
            return Advance { time, finished: false };
        }
        let Some(mut index) = self.section_index_at(time) else {
            return Advance { time, finished: true };
        };

        let mut time = time;
        let mut remaining = delta.abs();
        // Consecutive jumps that consumed no time; bounded so zero-length cycles end
        let mut idle_jumps = 0;
        // Time travelled when each section was last entered at its boundary
        let mut entered: Vec<Option<f32>> = vec![None; self.table.len()];
        let mut travelled = 0.0_f32;
        let max_crossings = 4 * (self.table.len() + 1);

        for _ in 0..max_crossings {
            let Ok(section) = self.table.section_at(index) else {
                return Advance { time, finished: true };
            };

            let (consumed, link) = if delta >= 0.0 {
                if time + remaining < section.end_time() {
                    return Advance {
                        time: time + remaining,
                        finished: false,
                    };
                }
                ((section.end_time() - time).max(0.0), self.table.next_index(index))
            } else {
                if time - remaining >= section.start_time {
                    return Advance {
                        time: time - remaining,
                        finished: false,
                    };
                }
                ((time - section.start_time).max(0.0), self.table.previous_of(index))
            };

            remaining -= consumed;
            travelled += consumed;
            if consumed > 0.0 {
                idle_jumps = 0;
            } else {
                idle_jumps += 1;
            }

            let boundary = if delta >= 0.0 {
                self.table.section_end_position(index).unwrap_or(time)
            } else {
                section.start_time
            };

            let Some(next) = link.filter(|_| idle_jumps <= self.table.len()) else {
                return Advance {
                    time: boundary,
                    finished: true,
                };
            };

            tracing::trace!("Crossing from section {index} to {next}");
            if let Some(slot) = entered.get_mut(next) {
                if let Some(previous) = *slot {
                    let cycle_length = travelled - previous;
                    if cycle_length > 0.0 {
                        remaining %= cycle_length;
                    }
                }
                *slot = Some(travelled);
            }

            index = next;
            time = if delta >= 0.0 {
                self.table.section_at(next).map(|s| s.start_time).unwrap_or(time)
            } else {
                self.table.section_end_position(next).unwrap_or(time)
            };
        }

        tracing::warn!("Advance by {delta} gave up after {max_crossings} section crossings");
        Advance { time, finished: false }
    }
}
