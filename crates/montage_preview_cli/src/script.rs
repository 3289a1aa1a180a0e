// SPDX-License-Identifier: MIT OR Apache-2.0
//! Preview commands parsed from the command line.

use montage_preview::{PreviewController, SectionError, SectionId};
use std::fmt;
use std::str::FromStr;

/// Error when parsing a command
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    /// Command word not recognised
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Command argument could not be parsed
    #[error("Invalid argument '{value}' for '{command}'")]
    InvalidArgument {
        /// Command word
        command: String,
        /// Offending argument
        value: String,
    },

    /// Required argument is missing
    #[error("Missing argument for '{0}'")]
    MissingArgument(String),
}

/// A single preview command
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewCommand {
    /// Normal preview, optionally anchored at a named section
    Normal(Option<SectionId>),
    /// All-sections preview
    AllSections,
    /// Turn looping on or off
    Looping(bool),
    /// Set playback direction
    Reverse(bool),
    /// Play forward
    Play,
    /// Play in reverse
    PlayReverse,
    /// Pause playback
    Pause,
    /// Stop and return to the start
    Stop,
    /// Step one frame forward
    StepForward,
    /// Step one frame backward
    StepBackward,
    /// Jump to where playback begins
    JumpToStart,
    /// Jump to where playback ends
    JumpToEnd,
    /// Jump to the preview start section
    JumpToPreviewStart,
    /// Jump to a named section's start or end
    JumpToSection {
        /// Section name
        name: SectionId,
        /// Land on the end instead of the start
        end: bool,
    },
    /// Advance playback by some seconds
    Tick(f32),
    /// Restore authored section links
    ResetOrder,
}

fn parse_switch(command: &str, value: Option<&str>) -> Result<bool, ScriptError> {
    match value {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        Some(other) => Err(ScriptError::InvalidArgument {
            command: command.to_string(),
            value: other.to_string(),
        }),
        None => Err(ScriptError::MissingArgument(command.to_string())),
    }
}

fn no_argument(command: &str, value: Option<&str>) -> Result<(), ScriptError> {
    match value {
        Some(other) => Err(ScriptError::InvalidArgument {
            command: command.to_string(),
            value: other.to_string(),
        }),
        None => Ok(()),
    }
}

impl FromStr for PreviewCommand {
    type Err = ScriptError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        let mut parts = source.splitn(3, ':');
        let command = parts.next().unwrap_or_default();
        let argument = parts.next();
        let extra = parts.next();

        if command == "jump" {
            let name = argument.ok_or_else(|| ScriptError::MissingArgument(command.to_string()))?;
            let end = match extra {
                None => false,
                Some("end") => true,
                Some(other) => {
                    return Err(ScriptError::InvalidArgument {
                        command: command.to_string(),
                        value: other.to_string(),
                    })
                }
            };
            return Ok(Self::JumpToSection {
                name: SectionId::from(name),
                end,
            });
        }
        no_argument(command, extra)?;

        let simple = match command {
            "normal" => return Ok(Self::Normal(argument.map(SectionId::from))),
            "loop" => return Ok(Self::Looping(parse_switch(command, argument)?)),
            "reverse" if argument.is_some() => return Ok(Self::Reverse(parse_switch(command, argument)?)),
            "tick" => {
                let value = argument.ok_or_else(|| ScriptError::MissingArgument(command.to_string()))?;
                let invalid = || ScriptError::InvalidArgument {
                    command: command.to_string(),
                    value: value.to_string(),
                };
                let seconds = value.parse::<f32>().map_err(|_| invalid())?;
                if !seconds.is_finite() {
                    return Err(invalid());
                }
                return Ok(Self::Tick(seconds));
            }
            "all" => Self::AllSections,
            "reverse" => Self::PlayReverse,
            "play" => Self::Play,
            "pause" => Self::Pause,
            "stop" => Self::Stop,
            "forward" => Self::StepForward,
            "back" => Self::StepBackward,
            "start" => Self::JumpToStart,
            "end" => Self::JumpToEnd,
            "preview-start" => Self::JumpToPreviewStart,
            "reset-order" => Self::ResetOrder,
            other => return Err(ScriptError::UnknownCommand(other.to_string())),
        };

        no_argument(command, argument)?;
        Ok(simple)
    }
}

impl PreviewCommand {
    /// Run the command against a controller
    pub fn apply(&self, controller: &mut PreviewController) -> Result<(), SectionError> {
        match self {
            Self::Normal(None) => controller.preview_normal(None),
            Self::Normal(Some(name)) => {
                let index = controller
                    .montage()
                    .and_then(|montage| montage.sections.index_of(name.as_str()))
                    .ok_or_else(|| SectionError::UnknownSection(name.clone()))?;
                controller.preview_normal(Some(index));
            }
            Self::AllSections => controller.preview_all_sections(),
            Self::Looping(looping) => controller.set_looping(*looping),
            Self::Reverse(reverse) => controller.set_reverse(*reverse),
            Self::Play => controller.play(),
            Self::PlayReverse => controller.play_reverse(),
            Self::Pause => controller.pause(),
            Self::Stop => controller.stop(),
            Self::StepForward => controller.step_forward(),
            Self::StepBackward => controller.step_backward(),
            Self::JumpToStart => controller.jump_to_start(),
            Self::JumpToEnd => controller.jump_to_end(),
            Self::JumpToPreviewStart => controller.jump_to_preview_start(),
            Self::JumpToSection { name, end } => controller.jump_to_section(name.as_str(), *end)?,
            Self::Tick(seconds) => controller.advance(*seconds),
            Self::ResetOrder => controller.restore_authored_order(),
        }
        Ok(())
    }
}

impl fmt::Display for PreviewCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal(None) => write!(f, "normal"),
            Self::Normal(Some(name)) => write!(f, "normal:{name}"),
            Self::AllSections => write!(f, "all"),
            Self::Looping(on) => write!(f, "loop:{}", if *on { "on" } else { "off" }),
            Self::Reverse(on) => write!(f, "reverse:{}", if *on { "on" } else { "off" }),
            Self::Play => write!(f, "play"),
            Self::PlayReverse => write!(f, "reverse"),
            Self::Pause => write!(f, "pause"),
            Self::Stop => write!(f, "stop"),
            Self::StepForward => write!(f, "forward"),
            Self::StepBackward => write!(f, "back"),
            Self::JumpToStart => write!(f, "start"),
            Self::JumpToEnd => write!(f, "end"),
            Self::JumpToPreviewStart => write!(f, "preview-start"),
            Self::JumpToSection { name, end: false } => write!(f, "jump:{name}"),
            Self::JumpToSection { name, end: true } => write!(f, "jump:{name}:end"),
            Self::Tick(seconds) => write!(f, "tick:{seconds}"),
            Self::ResetOrder => write!(f, "reset-order"),
        }
    }
}

/// One-line summary of the controller's playback state
pub fn describe(controller: &PreviewController) -> String {
    let state = controller.state();
    let section = controller
        .current_section()
        .map_or_else(|| "-".to_string(), ToString::to_string);

    let links = controller.montage().map_or_else(Vec::new, |montage| {
        montage
            .sections
            .iter()
            .map(|section| match section.next_section() {
                Some(next) => format!("{}->{}", section.name, next),
                None => format!("{}->|", section.name),
            })
            .collect()
    });

    format!(
        "t={:.4} section={} state={:?} mode={:?} loop={} links=[{}]",
        state.current_time,
        section,
        state.play_state,
        state.mode,
        state.looping,
        links.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_preview::{Montage, PreviewSettings, Section, SectionTable};

    fn controller() -> PreviewController {
        let mut montage = Montage::new("Combo", 3.0);
        montage.sections = SectionTable::from_sections([
            Section::new("A", 0.0, 1.0).with_next("B"),
            Section::new("B", 1.0, 1.0),
            Section::new("C", 2.0, 1.0),
        ])
        .unwrap();
        let mut controller = PreviewController::new(PreviewSettings::default());
        controller.set_montage(Some(montage));
        controller
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("normal".parse::<PreviewCommand>(), Ok(PreviewCommand::Normal(None)));
        assert_eq!(
            "normal:B".parse::<PreviewCommand>(),
            Ok(PreviewCommand::Normal(Some(SectionId::new("B"))))
        );
        assert_eq!("loop:off".parse::<PreviewCommand>(), Ok(PreviewCommand::Looping(false)));
        assert_eq!("reverse".parse::<PreviewCommand>(), Ok(PreviewCommand::PlayReverse));
        assert_eq!("reverse:on".parse::<PreviewCommand>(), Ok(PreviewCommand::Reverse(true)));
        assert_eq!("tick:0.25".parse::<PreviewCommand>(), Ok(PreviewCommand::Tick(0.25)));
        assert_eq!(
            "jump:C:end".parse::<PreviewCommand>(),
            Ok(PreviewCommand::JumpToSection {
                name: SectionId::new("C"),
                end: true
            })
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "rewind".parse::<PreviewCommand>(),
            Err(ScriptError::UnknownCommand("rewind".to_string()))
        );
        assert_eq!(
            "loop".parse::<PreviewCommand>(),
            Err(ScriptError::MissingArgument("loop".to_string()))
        );
        assert!(matches!(
            "tick:soon".parse::<PreviewCommand>(),
            Err(ScriptError::InvalidArgument { .. })
        ));
        for source in ["tick:nan", "tick:inf", "tick:-inf"] {
            assert_eq!(
                source.parse::<PreviewCommand>(),
                Err(ScriptError::InvalidArgument {
                    command: "tick".to_string(),
                    value: source["tick:".len()..].to_string(),
                })
            );
        }
        assert!(matches!(
            "play:now".parse::<PreviewCommand>(),
            Err(ScriptError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_display_parses_back() {
        for source in ["normal:B", "all", "loop:on", "jump:A:end", "tick:0.5", "preview-start"] {
            let command: PreviewCommand = source.parse().unwrap();
            assert_eq!(command.to_string(), source);
        }
    }

    #[test]
    fn test_apply_commands() {
        let mut controller = controller();
        "normal:C".parse::<PreviewCommand>().unwrap().apply(&mut controller).unwrap();
        assert_eq!(controller.state().anchor_section_index, 2);
        assert_eq!(controller.current_time(), 2.0);

        let unknown = PreviewCommand::Normal(Some(SectionId::new("Z")));
        assert_eq!(
            unknown.apply(&mut controller),
            Err(SectionError::UnknownSection(SectionId::new("Z")))
        );

        PreviewCommand::AllSections.apply(&mut controller).unwrap();
        let summary = describe(&controller);
        assert!(summary.contains("section=A"));
        assert!(summary.contains("A->B, B->C, C->A"));
    }
}
