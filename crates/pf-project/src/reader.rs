//! Line-oriented reading of section-based input text.
//!
//! The reader makes two passes over the input: one that creates every named
//! object (so later cross-references resolve) and one that assigns
//! properties. Errors are logged per line and counted; parsing aborts after
//! ten of them.

use pf_core::error::{EngineError, InputError};
use pf_network::Network;

/// Maximum number of per-line input errors tolerated.
const MAX_ERRORS: usize = 10;

/// The recognized input file sections, in keyword-match order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Title,
    Junctions,
    Reservoirs,
    Tanks,
    Pipes,
    Pumps,
    Valves,
    Patterns,
    Curves,
    Controls,
    Rules,
    Emitters,
    Demands,
    Status,
    Roughness,
    Leakage,
    Energy,
    Quality,
    Sources,
    Reactions,
    Mixing,
    Options,
    Times,
    Report,
    Coordinates,
    Vertices,
    Labels,
    Map,
    Backdrop,
    Tags,
    End,
}

/// Keyword list paired with sections; earlier entries win ambiguous
/// abbreviations, mirroring the keyword table the format grew up with.
const SECTIONS: &[(&str, Section)] = &[
    ("[TITLE", Section::Title),
    ("[JUNCTION", Section::Junctions),
    ("[RESERVOIR", Section::Reservoirs),
    ("[TANK", Section::Tanks),
    ("[PIPE", Section::Pipes),
    ("[PUMP", Section::Pumps),
    ("[VALVE", Section::Valves),
    ("[PATTERN", Section::Patterns),
    ("[CURVE", Section::Curves),
    ("[CONTROL", Section::Controls),
    ("[RULE", Section::Rules),
    ("[EMITTER", Section::Emitters),
    ("[DEMAND", Section::Demands),
    ("[STATUS", Section::Status),
    ("[ROUGHNESS", Section::Roughness),
    ("[LEAKAGE", Section::Leakage),
    ("[ENERGY", Section::Energy),
    ("[QUALITY", Section::Quality),
    ("[SOURCE", Section::Sources),
    ("[REACTION", Section::Reactions),
    ("[MIXING", Section::Mixing),
    ("[OPTION", Section::Options),
    ("[TIME", Section::Times),
    ("[REPORT", Section::Report),
    ("[COORD", Section::Coordinates),
    ("[VERTICES", Section::Vertices),
    ("[LABEL", Section::Labels),
    ("[MAP", Section::Map),
    ("[BACKDROP", Section::Backdrop),
    ("[TAG", Section::Tags),
    ("[END", Section::End),
];

/// Case-insensitive match where the shorter string is a prefix of the
/// longer, so `[JUNCTIONS]` and `[JUNC` both hit `[JUNCTION`.
fn keyword_match(token: &str, keyword: &str) -> bool {
    token
        .chars()
        .zip(keyword.chars())
        .all(|(a, b)| a.to_ascii_uppercase() == b.to_ascii_uppercase())
}

pub fn find_section(token: &str) -> Option<Section> {
    SECTIONS
        .iter()
        .find(|(keyword, _)| keyword_match(token, keyword))
        .map(|(_, section)| *section)
}

/// One pass of line parsing.
pub trait LineParser {
    fn parse_line(
        &mut self,
        net: &mut Network,
        section: Section,
        line: &str,
    ) -> Result<(), InputError>;
}

#[derive(Default)]
pub struct InputReader {
    err_count: usize,
}

impl InputReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the full input text into a network: object pass first, then
    /// property pass.
    pub fn read(&mut self, text: &str, net: &mut Network) -> Result<(), EngineError> {
        let mut objects = crate::parser::ObjectParser::new();
        self.parse_pass(text, net, &mut objects)?;

        let mut properties = crate::parser::PropertyParser::new();
        self.parse_pass(text, net, &mut properties)?;
        Ok(())
    }

    fn parse_pass(
        &mut self,
        text: &str,
        net: &mut Network,
        parser: &mut dyn LineParser,
    ) -> Result<(), EngineError> {
        let mut section: Option<Section> = None;

        for raw_line in text.lines() {
            if self.err_count >= MAX_ERRORS {
                break;
            }

            // strip comments and surrounding whitespace
            let line = match raw_line.find(';') {
                Some(pos) => &raw_line[..pos],
                None => raw_line,
            };
            let line = line.trim_end();
            let Some(token) = line.split_whitespace().next() else {
                continue;
            };

            let result = if token.starts_with('[') {
                match find_section(token) {
                    Some(new_section) => {
                        section = Some(new_section);
                        Ok(())
                    }
                    None => Err(InputError::InvalidKeyword(token.to_string())),
                }
            } else if let Some(section) = section {
                if section == Section::End {
                    break;
                }
                parser.parse_line(net, section, line)
            } else {
                Err(InputError::InvalidKeyword(token.to_string()))
            };

            if let Err(err) = result {
                self.err_count += 1;
                net.msg_log
                    .push(format!("{err} at the following line of input:"));
                net.msg_log.push(line.to_string());
            }
        }

        if self.err_count > 0 {
            return Err(InputError::ErrorsInInputData.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_keywords_allow_plural_and_abbreviation() {
        assert_eq!(find_section("[JUNCTIONS]"), Some(Section::Junctions));
        assert_eq!(find_section("[JUNC"), Some(Section::Junctions));
        assert_eq!(find_section("[junctions]"), Some(Section::Junctions));
        assert_eq!(find_section("[TANKS]"), Some(Section::Tanks));
        assert_eq!(find_section("[NOPE]"), None);
    }

    #[test]
    fn pipe_comes_before_pump_for_ambiguous_prefixes() {
        // "[P" is ambiguous; list order resolves it to PIPE, as the original
        // keyword table did
        assert_eq!(find_section("[P"), Some(Section::Pipes));
        assert_eq!(find_section("[PU"), Some(Section::Pumps));
    }
}
