// SPDX-License-Identifier: MIT OR Apache-2.0
//! Preview controller driving montage playback from editor commands.
//!
//! The controller owns the previewed montage and its transient
//! [`PlaybackState`]. Commands rewire the section graph through
//! [`LoopGraphBuilder`] and move the playhead through [`PlaybackCursor`].
//! Every command is a no-op while no montage is loaded.

use crate::cursor::{quantized_step_with_bias, PlaybackCursor, StepDirection};
use crate::loop_graph::LoopGraphBuilder;
use crate::montage::Montage;
use crate::section::{SectionError, SectionId};
use crate::settings::PreviewSettings;
use serde::{Deserialize, Serialize};

/// Which sections a preview plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PreviewMode {
    /// One section and the sections its chain leads to
    #[default]
    Normal,
    /// Every section in montage order
    AllSections,
}

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    /// Not playing, nothing in progress
    #[default]
    Stopped,
    /// Playing forward
    PlayingForward,
    /// Playing in reverse
    PlayingReverse,
    /// Paused mid-playback
    Paused,
}

impl PlayState {
    /// Is currently playing (forward or reverse)
    pub fn is_playing(&self) -> bool {
        matches!(self, PlayState::PlayingForward | PlayState::PlayingReverse)
    }
}

/// Transient state of one preview session
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    /// Preview mode
    pub mode: PreviewMode,
    /// Section treated as the start of normal-mode playback
    pub anchor_section_index: usize,
    /// Whether preview chains loop
    pub looping: bool,
    /// Whether playback runs backwards
    pub reverse: bool,
    /// Playhead position on the montage timeline
    pub current_time: f32,
    /// Transport state
    pub play_state: PlayState,
}

impl PlaybackState {
    fn from_settings(settings: &PreviewSettings) -> Self {
        Self {
            mode: settings.default_mode,
            anchor_section_index: 0,
            looping: settings.looping,
            reverse: false,
            current_time: 0.0,
            play_state: PlayState::Stopped,
        }
    }
}

/// Drives preview playback of a montage
#[derive(Debug, Clone)]
pub struct PreviewController {
    montage: Option<Montage>,
    state: PlaybackState,
    settings: PreviewSettings,
}

impl PreviewController {
    /// Create a controller with nothing loaded
    pub fn new(settings: PreviewSettings) -> Self {
        Self {
            montage: None,
            state: PlaybackState::from_settings(&settings),
            settings,
        }
    }

    /// Replace the previewed montage.
    ///
    /// Playback state starts over from the settings and the default mode's
    /// loop graph is built.
    pub fn set_montage(&mut self, montage: Option<Montage>) {
        self.montage = montage;
        self.state = PlaybackState::from_settings(&self.settings);

        let Some(montage) = self.montage.as_mut() else {
            return;
        };
        montage.sections.reset_to_authored();
        tracing::info!(
            "Previewing montage '{}' in {:?} mode",
            montage.name,
            self.settings.default_mode
        );

        match self.settings.default_mode {
            PreviewMode::Normal => self.preview_normal(None),
            PreviewMode::AllSections => self.preview_all_sections(),
        }
    }

    /// Previewed montage
    pub fn montage(&self) -> Option<&Montage> {
        self.montage.as_ref()
    }

    /// Current playback state
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Settings in use
    pub fn settings(&self) -> &PreviewSettings {
        &self.settings
    }

    /// Playhead position
    pub fn current_time(&self) -> f32 {
        self.state.current_time
    }

    /// Section under the playhead
    pub fn current_section(&self) -> Option<&SectionId> {
        let montage = self.montage.as_ref()?;
        let index = PlaybackCursor::new(&montage.sections).section_index_at(self.state.current_time)?;
        montage.sections.name_at(index)
    }

    /// Section playing after the one under the playhead
    pub fn next_section(&self) -> Option<&SectionId> {
        let montage = self.montage.as_ref()?;
        let index = PlaybackCursor::new(&montage.sections).section_index_at(self.state.current_time)?;
        montage.sections.section_at(index).ok()?.next_section()
    }

    /// Switch preview mode, keeping the current anchor
    pub fn set_mode(&mut self, mode: PreviewMode) {
        match mode {
            PreviewMode::Normal => self.preview_normal(Some(self.state.anchor_section_index)),
            PreviewMode::AllSections => self.preview_all_sections(),
        }
    }

    /// Preview one section and its chain.
    ///
    /// With `None`, the anchor is the first section whose authored chain
    /// reaches the section under the playhead. Moving to a different anchor
    /// (or into normal mode) restarts at the preview start.
    pub fn preview_normal(&mut self, from_section: Option<usize>) {
        let Some(montage) = self.montage.as_mut() else {
            tracing::warn!("Cannot preview section: no montage loaded");
            return;
        };

        let preferred = match from_section {
            Some(index) => index,
            None => {
                montage.sections.reset_to_authored();
                let cursor = PlaybackCursor::new(&montage.sections);
                cursor
                    .section_index_at(self.state.current_time)
                    .map_or(0, |index| cursor.first_section_mapping_to(index))
            }
        };

        match LoopGraphBuilder::build_normal_loop(&mut montage.sections, preferred, self.state.looping) {
            Ok(anchor) => {
                let restart = self.state.mode != PreviewMode::Normal || anchor != self.state.anchor_section_index;
                self.state.mode = PreviewMode::Normal;
                self.state.anchor_section_index = anchor;
                tracing::info!("Normal preview anchored at section {anchor}");
                if restart {
                    self.jump_to_preview_start();
                }
            }
            Err(err) => tracing::warn!("Cannot preview section {preferred}: {err}"),
        }
    }

    /// Preview every section chained in montage order
    pub fn preview_all_sections(&mut self) {
        let Some(montage) = self.montage.as_mut() else {
            tracing::warn!("Cannot preview all sections: no montage loaded");
            return;
        };

        if let Err(err) = LoopGraphBuilder::build_all_sections_loop(&mut montage.sections, self.state.looping) {
            tracing::warn!("Cannot preview all sections: {err}");
            return;
        }
        self.state.mode = PreviewMode::AllSections;
        tracing::info!("Previewing all sections");
        self.jump_to_preview_start();
    }

    /// Turn looping on or off, rebuilding the graph in place
    pub fn set_looping(&mut self, looping: bool) {
        let Some(montage) = self.montage.as_mut() else {
            return;
        };

        let result = match self.state.mode {
            PreviewMode::Normal => {
                LoopGraphBuilder::build_normal_loop(&mut montage.sections, self.state.anchor_section_index, looping)
                    .map(|anchor| self.state.anchor_section_index = anchor)
            }
            PreviewMode::AllSections => LoopGraphBuilder::build_all_sections_loop(&mut montage.sections, looping),
        };

        match result {
            Ok(()) => self.state.looping = looping,
            Err(err) => tracing::warn!("Cannot change looping: {err}"),
        }
    }

    /// Set playback direction
    pub fn set_reverse(&mut self, reverse: bool) {
        if self.montage.is_none() {
            return;
        }
        self.state.reverse = reverse;
        if self.state.play_state.is_playing() {
            self.state.play_state = self.playing_state();
        }
    }

    /// Play in the current direction from the playhead
    pub fn play(&mut self) {
        if self.montage.is_none() {
            return;
        }
        self.state.play_state = self.playing_state();
    }

    /// Play in reverse
    pub fn play_reverse(&mut self) {
        self.set_reverse(true);
        self.play();
    }

    /// Pause playback
    pub fn pause(&mut self) {
        if self.state.play_state.is_playing() {
            self.state.play_state = PlayState::Paused;
        }
    }

    /// Stop and return to the start
    pub fn stop(&mut self) {
        if self.montage.is_none() {
            return;
        }
        self.state.play_state = PlayState::Stopped;
        self.jump_to_start();
    }

    /// Toggle play/pause
    pub fn toggle_playback(&mut self) {
        if self.state.play_state.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Move the playhead to `time`, clamped to the timeline
    pub fn seek(&mut self, time: f32) {
        let Some(montage) = self.montage.as_ref() else {
            return;
        };
        self.state.current_time = time.clamp(0.0, timeline_length(montage));
    }

    /// Advance playback by `delta_time` seconds
    pub fn advance(&mut self, delta_time: f32) {
        let Some(montage) = self.montage.as_ref() else {
            return;
        };
        let direction = match self.state.play_state {
            PlayState::PlayingForward => 1.0,
            PlayState::PlayingReverse => -1.0,
            PlayState::Paused | PlayState::Stopped => return,
        };

        let delta = delta_time * self.settings.play_rate * direction;
        let advance = PlaybackCursor::new(&montage.sections).advance(self.state.current_time, delta);
        tracing::trace!("Advanced from {} to {}", self.state.current_time, advance.time);

        self.state.current_time = advance.time;
        if advance.finished {
            self.state.play_state = PlayState::Stopped;
        }
    }

    /// Step one frame forward and pause
    pub fn step_forward(&mut self) {
        self.step(StepDirection::Forward);
    }

    /// Step one frame backward and pause
    pub fn step_backward(&mut self) {
        self.step(StepDirection::Backward);
    }

    fn step(&mut self, direction: StepDirection) {
        let Some(montage) = self.montage.as_ref() else {
            return;
        };
        if montage.sections.is_empty() {
            return;
        }

        let (already_playing, reverse) = match direction {
            StepDirection::Forward => (self.state.play_state == PlayState::PlayingForward, false),
            StepDirection::Backward => (self.state.play_state == PlayState::PlayingReverse, true),
        };
        self.state.reverse = reverse;

        let current = self.state.current_time;
        let target = quantized_step_with_bias(
            current,
            timeline_length(montage),
            montage.num_frames(),
            direction,
            self.settings.step_bias,
        );
        let cursor = PlaybackCursor::new(&montage.sections);

        if !already_playing && !self.state.looping {
            // Snap onto the chain boundary instead of overshooting it
            let start = self.preview_start_index();
            let current_section = cursor.section_index_at(current);
            let boundary = match direction {
                StepDirection::Forward => {
                    let last = cursor.last_reachable_section(start, &montage.sections);
                    montage
                        .sections
                        .section_end_position(last)
                        .filter(|&end| current_section == Some(last) && target >= end)
                }
                StepDirection::Backward => montage
                    .sections
                    .section_at(start)
                    .ok()
                    .map(|section| section.start_time)
                    .filter(|&begin| current_section == Some(start) && target <= begin),
            };

            if let Some(boundary) = boundary {
                tracing::debug!("Step snapped to chain boundary at {boundary}");
                self.state.current_time = boundary;
                self.state.play_state = PlayState::Paused;
                return;
            }
        }

        let advance = cursor.advance(current, target - current);
        self.state.current_time = advance.time;
        self.state.play_state = PlayState::Paused;
    }

    /// Jump to where playback in the current direction begins.
    ///
    /// Forward that is the start of the preview start section; in reverse it
    /// is the end of the last section its chain reaches.
    pub fn jump_to_start(&mut self) {
        let Some(time) = self.chain_boundary(self.state.reverse) else {
            return;
        };
        self.state.current_time = time;
    }

    /// Jump to where playback in the current direction ends
    pub fn jump_to_end(&mut self) {
        let Some(time) = self.chain_boundary(!self.state.reverse) else {
            return;
        };
        self.state.current_time = time;
    }

    /// Jump to the start of the preview start section, whatever the direction
    pub fn jump_to_preview_start(&mut self) {
        let Some(time) = self.chain_boundary(false) else {
            return;
        };
        self.state.current_time = time;
    }

    /// Jump to the start or end of the named section
    pub fn jump_to_section(&mut self, name: &str, end_of_section: bool) -> Result<(), SectionError> {
        let Some(montage) = self.montage.as_ref() else {
            return Ok(());
        };
        let sections = &montage.sections;
        let index = sections
            .index_of(name)
            .ok_or_else(|| SectionError::UnknownSection(SectionId::new(name)))?;

        self.state.current_time = if end_of_section {
            sections.section_end_position(index).unwrap_or(self.state.current_time)
        } else {
            sections.section_at(index)?.start_time
        };
        Ok(())
    }

    /// Restore the authored section links
    pub fn restore_authored_order(&mut self) {
        if let Some(montage) = self.montage.as_mut() {
            montage.sections.reset_to_authored();
        }
    }

    fn playing_state(&self) -> PlayState {
        if self.state.reverse {
            PlayState::PlayingReverse
        } else {
            PlayState::PlayingForward
        }
    }

    fn preview_start_index(&self) -> usize {
        match self.state.mode {
            PreviewMode::Normal => self.state.anchor_section_index,
            PreviewMode::AllSections => 0,
        }
    }

    /// Start of the preview start section, or the end of its chain
    fn chain_boundary(&self, chain_end: bool) -> Option<f32> {
        let montage = self.montage.as_ref()?;
        let start = self.preview_start_index();
        if chain_end {
            let last = PlaybackCursor::new(&montage.sections).last_reachable_section(start, &montage.sections);
            montage.sections.section_end_position(last)
        } else {
            montage.sections.section_at(start).ok().map(|section| section.start_time)
        }
    }
}

impl Default for PreviewController {
    fn default() -> Self {
        Self::new(PreviewSettings::default())
    }
}

fn timeline_length(montage: &Montage) -> f32 {
    if montage.sequence_length > 0.0 {
        montage.sequence_length
    } else {
        montage.sections.total_length()
    }
}
