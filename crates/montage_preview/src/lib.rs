// SPDX-License-Identifier: MIT OR Apache-2.0
//! Montage section preview for animation editing.
//!
//! This crate provides the playback model behind montage preview:
//! - Named sections linked into a "next section" graph
//! - Loop graph rebuilding for single-section and all-sections preview
//! - Cycle-safe section queries and frame-quantized stepping
//! - A preview controller exposing the editor's transport commands
//!
//! ## Architecture
//!
//! Everything runs on the calling thread. The controller owns the previewed
//! [`Montage`]; its [`SectionTable`] keeps the authored links next to the live
//! links that [`LoopGraphBuilder`] rewires, so every rebuild starts again from
//! what the asset declares.

pub mod section;
pub mod montage;
pub mod loop_graph;
pub mod cursor;
pub mod controller;
pub mod settings;

pub use section::{
    AuthoredLinks, NextSectionResolver, Section, SectionError, SectionId, SectionTable,
    SECTION_END_EPSILON,
};
pub use montage::{Montage, MontageError, MontageId};
pub use loop_graph::{partition_chains, Chain, LoopGraphBuilder};
pub use cursor::{
    quantized_step, quantized_step_with_bias, Advance, PlaybackCursor, StepDirection,
    DEFAULT_STEP_BIAS,
};
pub use controller::{PlayState, PlaybackState, PreviewController, PreviewMode};
pub use settings::{PreviewSettings, SettingsError, PREVIEW_SETTINGS_FILE_NAME};
