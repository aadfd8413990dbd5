use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::ContextError;

/// Highest grade the assistant plans for.
pub const MAX_GRADE: u8 = 12;

/// A school grade level (1..=12), displayed as `Grade N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Grade(u8);

impl Grade {
    /// Creates a grade, rejecting levels outside 1..=12.
    pub fn new(level: u8) -> Result<Self, ContextError> {
        if (1..=MAX_GRADE).contains(&level) {
            Ok(Self(level))
        } else {
            Err(ContextError::InvalidGrade(level.to_string()))
        }
    }

    /// The numeric level.
    pub const fn level(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grade {}", self.0)
    }
}

impl FromStr for Grade {
    type Err = ContextError;

    /// Accepts `Grade 3`, `grade3`, `G3` and `3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        let digits = lowered
            .strip_prefix("grade")
            .or_else(|| lowered.strip_prefix('g'))
            .unwrap_or(&lowered)
            .trim();
        let level = digits.parse::<u8>().map_err(|_| ContextError::InvalidGrade(s.to_string()))?;
        Self::new(level).map_err(|_| ContextError::InvalidGrade(s.to_string()))
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Grade {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A non-empty, ordered set of grades served together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct GradeSet(BTreeSet<Grade>);

impl GradeSet {
    /// Builds a set, failing if no grade is given.
    pub fn new(grades: impl IntoIterator<Item = Grade>) -> Result<Self, ContextError> {
        let set: BTreeSet<Grade> = grades.into_iter().collect();
        if set.is_empty() {
            return Err(ContextError::NoGrades);
        }
        Ok(Self(set))
    }

    /// Parses a comma-separated list such as `1,2` or `Grade 1, Grade 2`.
    pub fn parse_list(list: &str) -> Result<Self, ContextError> {
        let grades = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Grade>, _>>()?;
        Self::new(grades)
    }

    /// Iterates grades in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Grade> + '_ {
        self.0.iter().copied()
    }

    /// Number of grades in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the set contains `grade`.
    pub fn contains(&self, grade: Grade) -> bool {
        self.0.contains(&grade)
    }
}

impl fmt::Display for GradeSet {
    /// Renders as a human-readable comma list: `Grade 1, Grade 2`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for grade in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{grade}")?;
            first = false;
        }
        Ok(())
    }
}

impl<'de> Deserialize<'de> for GradeSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let grades = BTreeSet::<Grade>::deserialize(deserializer)?;
        Self::new(grades).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_parsing_forms() {
        assert_eq!("Grade 3".parse::<Grade>().unwrap().level(), 3);
        assert_eq!("grade3".parse::<Grade>().unwrap().level(), 3);
        assert_eq!("G4".parse::<Grade>().unwrap().level(), 4);
        assert_eq!("1".parse::<Grade>().unwrap().level(), 1);
        assert!("Grade 0".parse::<Grade>().is_err());
        assert!("Grade 13".parse::<Grade>().is_err());
        assert!("first".parse::<Grade>().is_err());
    }

    #[test]
    fn test_grade_set_renders_comma_list() {
        let set = GradeSet::parse_list("2, Grade 1").unwrap();
        assert_eq!(set.to_string(), "Grade 1, Grade 2");
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_grade_set_rejects_empty() {
        assert!(matches!(GradeSet::new([]), Err(ContextError::NoGrades)));
        assert!(matches!(GradeSet::parse_list(" , "), Err(ContextError::NoGrades)));
    }

    #[test]
    fn test_grade_set_serde() {
        let set = GradeSet::parse_list("1,2").unwrap();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["Grade 1","Grade 2"]"#);
        let back: GradeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
        assert!(serde_json::from_str::<GradeSet>("[]").is_err());
    }
}
