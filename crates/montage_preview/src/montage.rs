// SPDX-License-Identifier: MIT OR Apache-2.0
//! Montage asset: a timeline split into linked sections.

use crate::section::{Section, SectionError, SectionId, SectionTable};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Unique identifier for a montage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MontageId(pub Uuid);

impl MontageId {
    /// Create a new random montage ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MontageId {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors raised while loading, saving or editing a montage
#[derive(Debug, thiserror::Error)]
pub enum MontageError {
    /// Section table error
    #[error("Section error: {0}")]
    Section(#[from] SectionError),

    /// RON parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// An animation montage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Montage {
    /// Unique montage ID
    #[serde(default)]
    pub id: MontageId,
    /// Montage name
    pub name: String,
    /// Length of the whole timeline
    pub sequence_length: f32,
    /// Frame rate used for frame stepping
    pub frame_rate: f32,
    /// Sections in timeline order
    pub sections: SectionTable,
}

impl Montage {
    /// Create an empty montage
    pub fn new(name: impl Into<String>, sequence_length: f32) -> Self {
        Self {
            id: MontageId::new(),
            name: name.into(),
            sequence_length,
            frame_rate: 30.0,
            sections: SectionTable::new(),
        }
    }

    /// Add a section starting at `start_time`
    ///
    /// If the section before it has no authored link yet, it is linked to the
    /// new one. Lengths are re-derived from start times.
    pub fn add_section(&mut self, name: impl Into<SectionId>, start_time: f32) -> Result<usize, SectionError> {
        let name = name.into();
        let start_time = start_time.clamp(0.0, self.sequence_length.max(0.0));
        let index = self.sections.insert_sorted(Section::new(name.clone(), start_time, 0.0))?;

        if let Some(previous) = index.checked_sub(1).and_then(|i| self.sections.section_at_mut(i)) {
            if previous.authored_next().is_none() {
                previous.set_authored_next(Some(name));
            }
        }

        self.sections.update_lengths(self.sequence_length);
        Ok(index)
    }

    /// Remove a section and every link pointing at it
    pub fn remove_section(&mut self, name: &str) -> Result<Section, SectionError> {
        let removed = self.sections.remove(name)?;
        self.sections.update_lengths(self.sequence_length);
        Ok(removed)
    }

    /// Number of frames on the timeline
    pub fn num_frames(&self) -> u32 {
        if self.sequence_length <= 0.0 || self.frame_rate <= 0.0 {
            return 0;
        }
        ((self.sequence_length * self.frame_rate).round() as u32).max(1)
    }

    /// Convert time to frame number
    pub fn time_to_frame(&self, time: f32) -> u32 {
        (time.max(0.0) * self.frame_rate) as u32
    }

    /// Convert frame number to time
    pub fn frame_to_time(&self, frame: u32) -> f32 {
        if self.frame_rate <= 0.0 {
            return 0.0;
        }
        frame as f32 / self.frame_rate
    }

    /// Time left until the end of the section containing `position`
    pub fn section_time_left(&self, position: f32) -> Option<f32> {
        let section = self.sections.iter().find(|s| s.contains(position))?;
        Some(section.end_time() - position)
    }

    /// Serialize to a pretty RON string
    pub fn to_ron(&self) -> Result<String, MontageError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Parse from a RON string
    pub fn from_ron(source: &str) -> Result<Self, MontageError> {
        Ok(ron::from_str(source)?)
    }

    /// Load a montage file
    pub fn load(path: &Path) -> Result<Self, MontageError> {
        let source = std::fs::read_to_string(path)?;
        let montage = Self::from_ron(&source)?;
        tracing::info!(
            "Loaded montage '{}' ({} sections) from {}",
            montage.name,
            montage.sections.len(),
            path.display()
        );
        Ok(montage)
    }

    /// Save to a montage file
    pub fn save(&self, path: &Path) -> Result<(), MontageError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_section_links_previous() {
        let mut montage = Montage::new("Attack", 3.0);
        montage.add_section("Windup", 0.0).unwrap();
        montage.add_section("Recover", 2.0).unwrap();
        // Inserted between the two, by start time
        assert_eq!(montage.add_section("Swing", 1.0).unwrap(), 1);

        let names: Vec<&str> = montage.sections.names().map(SectionId::as_str).collect();
        assert_eq!(names, ["Windup", "Swing", "Recover"]);

        // Windup was already linked to Recover, Swing gets no automatic link
        assert_eq!(montage.sections.authored_links(), vec![Some(2), None, None]);

        let lengths: Vec<f32> = montage.sections.iter().map(|s| s.length).collect();
        assert_eq!(lengths, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_add_duplicate_section() {
        let mut montage = Montage::new("Attack", 1.0);
        montage.add_section("Default", 0.0).unwrap();
        assert_eq!(
            montage.add_section("Default", 0.5),
            Err(SectionError::DuplicateSection(SectionId::new("Default")))
        );
    }

    #[test]
    fn test_remove_section() {
        let mut montage = Montage::new("Attack", 2.0);
        montage.add_section("A", 0.0).unwrap();
        montage.add_section("B", 1.0).unwrap();
        montage.remove_section("B").unwrap();
        assert_eq!(montage.sections.len(), 1);
        assert_eq!(montage.sections.authored_links(), vec![None]);
        assert_eq!(montage.sections.section_at(0).unwrap().length, 2.0);
        assert!(montage.remove_section("B").is_err());
    }

    #[test]
    fn test_frames_and_time_left() {
        let mut montage = Montage::new("Idle", 2.0);
        montage.add_section("A", 0.0).unwrap();
        montage.add_section("B", 0.5).unwrap();
        assert_eq!(montage.num_frames(), 60);
        assert_eq!(montage.time_to_frame(1.0), 30);
        assert_eq!(montage.frame_to_time(15), 0.5);
        assert_eq!(montage.section_time_left(0.25), Some(0.25));
        assert_eq!(montage.section_time_left(5.0), None);
    }

    #[test]
    fn test_serialization() {
        let mut montage = Montage::new("Combo", 2.0);
        montage.add_section("A", 0.0).unwrap();
        montage.add_section("B", 1.0).unwrap();
        montage.sections.set_next_index(1, Some(1)).unwrap();

        let ron = montage.to_ron().unwrap();
        let loaded = Montage::from_ron(&ron).unwrap();
        assert_eq!(loaded.name, "Combo");
        assert_eq!(loaded.id, montage.id);
        // Only the authored linkage is persisted
        assert_eq!(loaded.sections.links(), vec![Some(1), None]);
    }

    #[test]
    fn test_negative_length_rejected_on_load() {
        let source = r#"(
            name: "Broken",
            sequence_length: 2.0,
            frame_rate: 30.0,
            sections: [(name: "A", start_time: 0.0, length: -1.0)],
        )"#;
        assert!(matches!(Montage::from_ron(source), Err(MontageError::Parse(_))));
    }

    #[test]
    fn test_demo_montage_loads() {
        let montage = Montage::from_ron(include_str!("../../../demos/combo.ron")).unwrap();
        assert_eq!(montage.name, "Combo");
        assert_eq!(montage.sections.links(), vec![Some(1), Some(1), None]);
        assert_eq!(montage.num_frames(), 120);
    }
}
