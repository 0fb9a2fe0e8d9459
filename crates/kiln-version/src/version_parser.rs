//! Version string parsing

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::version::{Component, Segment, Version};

/// Error type for version parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseVersionError {
    #[error("Empty version string")]
    Empty,
    #[error("Invalid version string \"{0}\": empty segment")]
    EmptySegment(String),
    #[error("Invalid version string \"{0}\": illegal character")]
    InvalidCharacter(String),
    #[error("Invalid version string \"{0}\": epoch must be an integer")]
    InvalidEpoch(String),
    #[error("Invalid version string \"{0}\": duplicated epoch separator '!'")]
    MultipleEpochs(String),
    #[error("Invalid version string \"{0}\": duplicated local version separator '+'")]
    MultipleLocal(String),
    #[error("Invalid version string \"{0}\": number too large")]
    NumberTooLarge(String),
}

lazy_static! {
    static ref VALID_CHARS_RE: Regex = Regex::new(r"^[0-9a-z._+!\-]+$").unwrap();
    static ref RUN_RE: Regex = Regex::new(r"[0-9]+|[a-z]+").unwrap();
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let source = text.trim();
        if source.is_empty() {
            return Err(ParseVersionError::Empty);
        }

        let lower = source.to_lowercase();
        if !VALID_CHARS_RE.is_match(&lower) {
            return Err(ParseVersionError::InvalidCharacter(source.to_string()));
        }

        let (epoch, rest) = match lower.split_once('!') {
            Some((epoch, rest)) => {
                if rest.contains('!') {
                    return Err(ParseVersionError::MultipleEpochs(source.to_string()));
                }
                if epoch.is_empty() || !epoch.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ParseVersionError::InvalidEpoch(source.to_string()));
                }
                let epoch = epoch
                    .parse::<u64>()
                    .map_err(|_| ParseVersionError::NumberTooLarge(source.to_string()))?;
                (epoch, rest)
            }
            None => (0, lower.as_str()),
        };

        let (release, local) = match rest.split_once('+') {
            Some((release, local)) => {
                if local.contains('+') {
                    return Err(ParseVersionError::MultipleLocal(source.to_string()));
                }
                (release, Some(local))
            }
            None => (rest, None),
        };

        let segments = parse_segments(release, source)?;
        let local = match local {
            Some(local) => parse_segments(local, source)?,
            None => Vec::new(),
        };

        Ok(Version {
            source: source.to_string(),
            epoch,
            segments,
            local,
        })
    }
}

/// Split `part` on `.`, `_` and `-`, then each segment into digit and letter runs.
fn parse_segments(part: &str, source: &str) -> Result<Vec<Segment>, ParseVersionError> {
    part.split(['.', '_', '-'])
        .map(|segment| {
            if segment.is_empty() {
                return Err(ParseVersionError::EmptySegment(source.to_string()));
            }

            let mut components = Segment::new();
            for run in RUN_RE.find_iter(segment).map(|m| m.as_str()) {
                if run.as_bytes()[0].is_ascii_digit() {
                    let n = run
                        .parse::<u64>()
                        .map_err(|_| ParseVersionError::NumberTooLarge(source.to_string()))?;
                    components.push(Component::Numeric(n));
                } else {
                    // Segments that start with letters get an implicit leading zero
                    if components.is_empty() {
                        components.push(Component::Numeric(0));
                    }
                    components.push(Component::from_alpha(run));
                }
            }
            Ok(components)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let v: Version = "1.2.3".parse().unwrap();
        assert_eq!(v.epoch(), 0);
        assert_eq!(
            v.segments(),
            &[
                vec![Component::Numeric(1)],
                vec![Component::Numeric(2)],
                vec![Component::Numeric(3)]
            ]
        );
        assert!(v.local().is_empty());
    }

    #[test]
    fn test_parse_alpha_runs() {
        let v: Version = "1.0RC1".parse().unwrap();
        assert_eq!(
            v.segments()[1],
            vec![
                Component::Numeric(0),
                Component::Iden("rc".to_string()),
                Component::Numeric(1)
            ]
        );

        let v: Version = "1.post2".parse().unwrap();
        assert_eq!(
            v.segments()[1],
            vec![Component::Numeric(0), Component::Post, Component::Numeric(2)]
        );
    }

    #[test]
    fn test_parse_epoch_and_local() {
        let v: Version = "2!1.0+build.7".parse().unwrap();
        assert_eq!(v.epoch(), 2);
        assert_eq!(v.segments().len(), 2);
        assert_eq!(v.local().len(), 2);
        assert_eq!(v.as_str(), "2!1.0+build.7");
    }

    #[test]
    fn test_separators_are_equivalent() {
        let a: Version = "1.2.3".parse().unwrap();
        let b: Version = "1_2-3".parse().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<Version>(), Err(ParseVersionError::Empty));
        assert_eq!("   ".parse::<Version>(), Err(ParseVersionError::Empty));
        assert!(matches!("1..2".parse::<Version>(), Err(ParseVersionError::EmptySegment(_))));
        assert!(matches!(".1".parse::<Version>(), Err(ParseVersionError::EmptySegment(_))));
        assert!(matches!("1.".parse::<Version>(), Err(ParseVersionError::EmptySegment(_))));
        assert!(matches!("1.0 beta".parse::<Version>(), Err(ParseVersionError::InvalidCharacter(_))));
        assert!(matches!("1.*".parse::<Version>(), Err(ParseVersionError::InvalidCharacter(_))));
        assert!(matches!("x!1.0".parse::<Version>(), Err(ParseVersionError::InvalidEpoch(_))));
        assert!(matches!("1!2!3".parse::<Version>(), Err(ParseVersionError::MultipleEpochs(_))));
        assert!(matches!("1+a+b".parse::<Version>(), Err(ParseVersionError::MultipleLocal(_))));
        assert!(matches!(
            "99999999999999999999999".parse::<Version>(),
            Err(ParseVersionError::NumberTooLarge(_))
        ));
    }
}
