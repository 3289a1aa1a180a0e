// SPDX-License-Identifier: MIT OR Apache-2.0
//! Montage sections and the table that links them.
//!
//! Every section carries two "next section" links:
//! - the authored link, which is what the montage asset declares and what gets
//!   serialized
//! - the live link, which preview playback rewires freely and which
//!   [`SectionTable::reset_to_authored`] restores from the authored one

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Distance kept from a section's end when jumping to it, so the resulting
/// position still resolves to that section rather than the following one.
pub const SECTION_END_EPSILON: f32 = 1.0e-4;

/// Name of a section, unique within its montage
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(pub String);

impl SectionId {
    /// Create a section name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SectionId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for SectionId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for SectionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Errors raised by section lookups and link edits
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SectionError {
    /// Section index does not exist in the table
    #[error("Invalid section index: {0}")]
    InvalidSection(usize),

    /// Link target names a section that is not in the table
    #[error("Unknown section: {0}")]
    UnknownSection(SectionId),

    /// Index lookup past the end of the table
    #[error("Section index {index} out of range (table has {len} sections)")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Number of sections in the table
        len: usize,
    },

    /// Two sections share a name
    #[error("Duplicate section: {0}")]
    DuplicateSection(SectionId),

    /// Start time or length is negative or not finite
    #[error("Invalid timing for section: {0}")]
    InvalidTiming(SectionId),
}

/// A named, time-bounded segment of a montage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Section name
    pub name: SectionId,
    /// Offset into the montage timeline
    pub start_time: f32,
    /// Duration of the section
    pub length: f32,
    /// Link declared by the montage asset
    #[serde(rename = "next_section", default)]
    authored_next: Option<SectionId>,
    /// Link used by playback
    #[serde(skip)]
    live_next: Option<SectionId>,
}

impl Section {
    /// Create an unlinked section
    pub fn new(name: impl Into<SectionId>, start_time: f32, length: f32) -> Self {
        Self {
            name: name.into(),
            start_time,
            length,
            authored_next: None,
            live_next: None,
        }
    }

    /// Set the authored link (the live link follows it)
    pub fn with_next(mut self, next: impl Into<SectionId>) -> Self {
        let next = next.into();
        self.authored_next = Some(next.clone());
        self.live_next = Some(next);
        self
    }

    /// End of the section on the montage timeline
    pub fn end_time(&self) -> f32 {
        self.start_time + self.length
    }

    /// Whether `time` falls in `[start_time, end_time)`
    pub fn contains(&self, time: f32) -> bool {
        time >= self.start_time && time < self.end_time()
    }

    /// Link currently used by playback
    pub fn next_section(&self) -> Option<&SectionId> {
        self.live_next.as_ref()
    }

    /// Link declared by the montage asset
    pub fn authored_next(&self) -> Option<&SectionId> {
        self.authored_next.as_ref()
    }

    pub(crate) fn set_authored_next(&mut self, next: Option<SectionId>) {
        self.authored_next = next.clone();
        self.live_next = next;
    }
}

/// Answers "which section plays after this one"
///
/// Running montage instances can resolve this dynamically, so queries that
/// walk live playback take the resolver as a parameter instead of reading the
/// table directly.
pub trait NextSectionResolver {
    /// Index of the section following `index`, if any
    fn next_section(&self, index: usize) -> Option<usize>;
}

/// Ordered sections of one montage, in declaration order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Section>", into = "Vec<Section>")]
pub struct SectionTable {
    sections: IndexMap<SectionId, Section>,
}

impl SectionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table, checking names are unique, timings are valid and links resolve
    pub fn from_sections(sections: impl IntoIterator<Item = Section>) -> Result<Self, SectionError> {
        let mut table = Self::new();
        for mut section in sections {
            if table.sections.contains_key(section.name.as_str()) {
                return Err(SectionError::DuplicateSection(section.name));
            }
            check_timing(&section)?;
            section.live_next = section.authored_next.clone();
            table.sections.insert(section.name.clone(), section);
        }

        for section in table.sections.values() {
            if let Some(next) = &section.authored_next {
                if !table.sections.contains_key(next.as_str()) {
                    return Err(SectionError::UnknownSection(next.clone()));
                }
            }
        }

        Ok(table)
    }

    /// Number of sections
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Whether the table has no sections
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Iterate sections in order
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.values()
    }

    /// Iterate section names in order
    pub fn names(&self) -> impl Iterator<Item = &SectionId> {
        self.sections.keys()
    }

    /// Index of the named section
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.sections.get_index_of(name)
    }

    /// Section at `index`
    pub fn section_at(&self, index: usize) -> Result<&Section, SectionError> {
        self.sections
            .get_index(index)
            .map(|(_, section)| section)
            .ok_or(SectionError::OutOfRange {
                index,
                len: self.len(),
            })
    }

    /// Section with the given name
    pub fn section_by_name(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }

    /// Name of the section at `index`
    pub fn name_at(&self, index: usize) -> Option<&SectionId> {
        self.sections.get_index(index).map(|(name, _)| name)
    }

    /// Live link of the section at `index`, as an index
    pub fn next_index(&self, index: usize) -> Option<usize> {
        let next = self.section_at(index).ok()?.live_next.as_ref()?;
        self.index_of(next.as_str())
    }

    /// Authored link of the section at `index`, as an index
    pub fn authored_next_index(&self, index: usize) -> Option<usize> {
        let next = self.section_at(index).ok()?.authored_next.as_ref()?;
        self.index_of(next.as_str())
    }

    /// Point the live link of the section at `index` to `target`
    pub fn set_next(&mut self, index: usize, target: Option<SectionId>) -> Result<(), SectionError> {
        if let Some(name) = &target {
            if !self.sections.contains_key(name.as_str()) {
                return Err(SectionError::UnknownSection(name.clone()));
            }
        }
        let len = self.len();
        let (_, section) = self
            .sections
            .get_index_mut(index)
            .ok_or(SectionError::OutOfRange { index, len })?;
        section.live_next = target;
        Ok(())
    }

    /// Point the live link of the section at `index` to the section at `target`
    pub fn set_next_index(&mut self, index: usize, target: Option<usize>) -> Result<(), SectionError> {
        let target = match target {
            Some(target) => Some(self.section_at(target)?.name.clone()),
            None => None,
        };
        self.set_next(index, target)
    }

    /// Restore every live link to its authored value
    pub fn reset_to_authored(&mut self) {
        for section in self.sections.values_mut() {
            section.live_next = section.authored_next.clone();
        }
    }

    /// Section whose live link points at `index`
    ///
    /// When several do, the highest index wins.
    pub fn previous_of(&self, index: usize) -> Option<usize> {
        (0..self.len())
            .rev()
            .find(|&candidate| self.next_index(candidate) == Some(index))
    }

    /// Position a "jump to section end" lands on
    pub fn section_end_position(&self, index: usize) -> Option<f32> {
        let section = self.section_at(index).ok()?;
        Some((section.end_time() - SECTION_END_EPSILON).max(section.start_time))
    }

    /// End of the last section on the timeline
    pub fn total_length(&self) -> f32 {
        self.sections
            .values()
            .map(Section::end_time)
            .fold(0.0, f32::max)
    }

    /// Live links of every section, by index
    pub fn links(&self) -> Vec<Option<usize>> {
        (0..self.len()).map(|index| self.next_index(index)).collect()
    }

    /// Authored links of every section, by index
    pub fn authored_links(&self) -> Vec<Option<usize>> {
        (0..self.len())
            .map(|index| self.authored_next_index(index))
            .collect()
    }

    /// Insert a section keeping start times ordered
    pub(crate) fn insert_sorted(&mut self, section: Section) -> Result<usize, SectionError> {
        if self.sections.contains_key(section.name.as_str()) {
            return Err(SectionError::DuplicateSection(section.name));
        }
        check_timing(&section)?;
        if let Some(next) = &section.authored_next {
            if !self.sections.contains_key(next.as_str()) {
                return Err(SectionError::UnknownSection(next.clone()));
            }
        }

        let position = self
            .sections
            .values()
            .position(|existing| existing.start_time > section.start_time)
            .unwrap_or(self.len());
        self.sections.shift_insert(position, section.name.clone(), section);
        Ok(position)
    }

    /// Remove a section and every link pointing at it
    pub(crate) fn remove(&mut self, name: &str) -> Result<Section, SectionError> {
        let removed = self
            .sections
            .shift_remove(name)
            .ok_or_else(|| SectionError::UnknownSection(SectionId::new(name)))?;

        for section in self.sections.values_mut() {
            if section.authored_next.as_ref() == Some(&removed.name) {
                section.authored_next = None;
            }
            if section.live_next.as_ref() == Some(&removed.name) {
                section.live_next = None;
            }
        }

        Ok(removed)
    }

    pub(crate) fn section_at_mut(&mut self, index: usize) -> Option<&mut Section> {
        self.sections.get_index_mut(index).map(|(_, section)| section)
    }

    /// Derive lengths from successive start times, the last ending at `sequence_length`
    pub(crate) fn update_lengths(&mut self, sequence_length: f32) {
        let starts: Vec<f32> = self.sections.values().map(|s| s.start_time).collect();
        for (index, section) in self.sections.values_mut().enumerate() {
            let end = starts.get(index + 1).copied().unwrap_or(sequence_length);
            section.length = (end - section.start_time).max(0.0);
        }
    }
}

impl TryFrom<Vec<Section>> for SectionTable {
    type Error = SectionError;

    fn try_from(sections: Vec<Section>) -> Result<Self, Self::Error> {
        Self::from_sections(sections)
    }
}

impl From<SectionTable> for Vec<Section> {
    fn from(table: SectionTable) -> Self {
        table.sections.into_values().collect()
    }
}

impl NextSectionResolver for SectionTable {
    fn next_section(&self, index: usize) -> Option<usize> {
        self.next_index(index)
    }
}

/// Resolves over authored links instead of live ones
#[derive(Debug, Clone, Copy)]
pub struct AuthoredLinks<'a>(pub &'a SectionTable);

impl NextSectionResolver for AuthoredLinks<'_> {
    fn next_section(&self, index: usize) -> Option<usize> {
        self.0.authored_next_index(index)
    }
}

fn check_timing(section: &Section) -> Result<(), SectionError> {
    let valid = |value: f32| value.is_finite() && value >= 0.0;
    if valid(section.start_time) && valid(section.length) {
        Ok(())
    } else {
        Err(SectionError::InvalidTiming(section.name.clone()))
    }
}
