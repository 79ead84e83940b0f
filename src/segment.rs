use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the two Lassa virus genome segments. Each segment gets its own
/// reference selection and consensus build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Segment {
    L,
    S,
}

impl Segment {
    pub const ALL: [Segment; 2] = [Segment::L, Segment::S];

    /// Directory name used by the reference catalog and the aggregated
    /// results area.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Segment::L => "L_segment",
            Segment::S => "S_segment",
        }
    }

    /// Length of the NCBI RefSeq reference for this segment, used as the
    /// canonical denominator when scoring completeness.
    pub fn canonical_len(&self) -> usize {
        match self {
            Segment::L => 7279,
            Segment::S => 3402,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::L => write!(f, "L"),
            Segment::S => write!(f, "S"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_names() {
        assert_eq!(Segment::L.dir_name(), "L_segment");
        assert_eq!(Segment::S.dir_name(), "S_segment");
    }

    #[test]
    fn test_canonical_lengths() {
        assert_eq!(Segment::L.canonical_len(), 7279);
        assert_eq!(Segment::S.canonical_len(), 3402);
    }

    #[test]
    fn test_serde_representation() {
        assert_eq!(serde_json::to_string(&Segment::L).unwrap(), "\"L\"");
        let seg: Segment = serde_json::from_str("\"S\"").unwrap();
        assert_eq!(seg, Segment::S);
    }
}
