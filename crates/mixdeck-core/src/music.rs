//! Music theory utilities
//!
//! Key representation shared between the chroma-based key estimator and
//! hosts that display or match keys.

use serde::{Deserialize, Serialize};

/// Pitch class names, indexed by semitone offset from C
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Musical key with root note and scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicalKey {
    /// Root note as semitone offset from C (0=C, 1=C#, ..., 11=B)
    pub root: u8,
    /// true = minor, false = major
    pub minor: bool,
}

impl MusicalKey {
    pub const fn new(root: u8, minor: bool) -> Self {
        Self {
            root: root % 12,
            minor,
        }
    }

    /// Parse key strings like "Am", "C#m", "F", "Bb"
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let mut chars = s.chars().peekable();

        let root_char = chars.next()?.to_ascii_uppercase();
        let base_root = match root_char {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };

        let root = match chars.peek() {
            Some('#') => {
                chars.next();
                (base_root + 1) % 12
            }
            Some('b') => {
                chars.next();
                (base_root + 11) % 12 // +11 is -1 mod 12
            }
            _ => base_root,
        };

        let remaining: String = chars.collect();
        let minor = remaining.to_lowercase().starts_with('m');

        Some(Self { root, minor })
    }

    /// Root note name, normalized to sharps
    pub fn note_name(&self) -> &'static str {
        NOTE_NAMES[self.root as usize]
    }

    /// Relative major/minor key (minor -> major is 3 semitones up)
    pub fn relative(&self) -> Self {
        if self.minor {
            Self {
                root: (self.root + 3) % 12,
                minor: false,
            }
        } else {
            Self {
                root: (self.root + 9) % 12,
                minor: true,
            }
        }
    }
}

impl std::fmt::Display for MusicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.minor {
            write!(f, "{}m", self.note_name())
        } else {
            write!(f, "{}", self.note_name())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_major_keys() {
        assert_eq!(MusicalKey::parse("C"), Some(MusicalKey::new(0, false)));
        assert_eq!(MusicalKey::parse("F#"), Some(MusicalKey::new(6, false)));
        assert_eq!(MusicalKey::parse("Bb"), Some(MusicalKey::new(10, false)));
    }

    #[test]
    fn test_parse_minor_keys() {
        assert_eq!(MusicalKey::parse("Am"), Some(MusicalKey::new(9, true)));
        assert_eq!(MusicalKey::parse("C#m"), Some(MusicalKey::new(1, true)));
    }

    #[test]
    fn test_relative_keys() {
        let am = MusicalKey::parse("Am").unwrap();
        let c = MusicalKey::parse("C").unwrap();
        assert_eq!(am.relative(), c);
        assert_eq!(c.relative(), am);
    }

    #[test]
    fn test_display() {
        assert_eq!(MusicalKey::new(9, false).to_string(), "A");
        assert_eq!(MusicalKey::new(9, true).to_string(), "Am");
        assert_eq!(MusicalKey::parse("Bb").unwrap().to_string(), "A#");
    }
}
