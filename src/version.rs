//! Lenient version ordering for declared package versions.
//!
//! Declared versions are free-form (`1.2.3`, `2.0`, `v1.0.0-rc1`, `13.0.4+abc`).
//! They are coerced to a numeric-dot sequence for comparison:
//!
//! - a leading non-digit prefix (`v`) and build metadata after `+` are ignored
//! - each dot-separated segment compares by its leading digits first, then by
//!   the remaining text lexically, so `1.0.0` < `1.0.0-rc` (lexical tie-break,
//!   not semver pre-release ordering)
//! - missing segments count as `0`, so `2` == `2.0.0`

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
struct Segment {
    number: u64,
    suffix: String,
}

/// A declared version coerced to numeric-dot form.
#[derive(Debug, Clone)]
pub struct LenientVersion {
    segments: Vec<Segment>,
}

impl LenientVersion {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let without_build = trimmed.split('+').next().unwrap_or_default();
        let body = match without_build.find(|c: char| c.is_ascii_digit()) {
            Some(start) => &without_build[start..],
            None => "",
        };

        let segments = if body.is_empty() {
            Vec::new()
        } else {
            body.split('.').map(parse_segment).collect()
        };

        Self { segments }
    }
}

fn parse_segment(raw: &str) -> Segment {
    let digits_end = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, suffix) = raw.split_at(digits_end);
    Segment {
        number: digits.parse().unwrap_or(if digits.is_empty() { 0 } else { u64::MAX }),
        suffix: suffix.to_string(),
    }
}

impl Ord for LenientVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let zero = Segment::default();
        let len = self.segments.len().max(other.segments.len());
        (0..len)
            .map(|i| {
                let a = self.segments.get(i).unwrap_or(&zero);
                let b = other.segments.get(i).unwrap_or(&zero);
                a.cmp(b)
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for LenientVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for LenientVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LenientVersion {}

/// Compares two declared version strings.
pub fn compare(a: &str, b: &str) -> Ordering {
    LenientVersion::parse(a).cmp(&LenientVersion::parse(b))
}
