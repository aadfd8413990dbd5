//! Splits chapter text into topics at recognised header lines.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// Headers used by the primary-grade English textbooks the app started with.
pub const DEFAULT_TOPIC_HEADERS: &str = r"(Two Little Hands|Parts of the Body|Let us [A-Za-z]+|Picture\s+(Talk|Time)|Sight words|New words|Alphabet song|Letter sounds|Odd One Out|Note to the teacher)";

/// Headers that continue the previous topic instead of starting one.
const MERGE_WITH_PREVIOUS: [&str; 3] = ["sight words", "new words", "note to the teacher"];

static DEFAULT_HEADER_REGEX: Lazy<Regex> = Lazy::new(|| {
    RegexBuilder::new(DEFAULT_TOPIC_HEADERS)
        .case_insensitive(true)
        .build()
        .expect("default topic header regex should be valid")
});

/// One topic cut from a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topic {
    /// 1-based position in the chapter.
    pub index: usize,
    /// Header text as matched.
    pub header: String,
    /// `NN_Header_Text`, used as a file or key name.
    pub name: String,
    pub text: String,
}

impl Topic {
    /// Human-readable form of [`name`](Self::name), unique within a chapter.
    pub fn title(&self) -> String {
        self.name.replace('_', " ")
    }
}

/// Header-driven topic splitter.
#[derive(Debug, Clone)]
pub struct TopicSplitter {
    header: Regex,
}

impl Default for TopicSplitter {
    fn default() -> Self {
        Self { header: DEFAULT_HEADER_REGEX.clone() }
    }
}

impl TopicSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Splitter matching `pattern` case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns the regex error if `pattern` is invalid.
    pub fn with_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self { header: RegexBuilder::new(pattern).case_insensitive(true).build()? })
    }

    /// Splits `text` into topics.
    ///
    /// Pages (form-feed separated) are the unit when present, otherwise
    /// lines. Text before the first header belongs to the first topic; text
    /// with no header at all yields no topics.
    pub fn split(&self, text: &str) -> Vec<Topic> {
        let units: Vec<&str> =
            if text.contains('\u{c}') { text.split('\u{c}').collect() } else { text.lines().collect() };

        let mut topics = Vec::new();
        let mut current: Option<String> = None;
        let mut buffer: Vec<&str> = Vec::new();

        for unit in units {
            if let Some(found) = self.header.find(unit) {
                let header = found.as_str().trim();
                let merges = MERGE_WITH_PREVIOUS.contains(&header.to_lowercase().as_str());
                if !(merges && current.is_some()) {
                    if let Some(previous) = current.take() {
                        topics.push(make_topic(topics.len() + 1, previous, &buffer));
                        buffer.clear();
                    }
                    current = Some(header.to_string());
                }
            }
            let unit = unit.trim();
            if !unit.is_empty() {
                buffer.push(unit);
            }
        }
        if let Some(previous) = current {
            topics.push(make_topic(topics.len() + 1, previous, &buffer));
        }
        topics
    }
}

fn make_topic(index: usize, header: String, lines: &[&str]) -> Topic {
    let name = format!("{index:02}_{}", header.split_whitespace().collect::<Vec<_>>().join("_"));
    Topic { index, header, name, text: lines.join("\n").trim().to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAPTER: &str = "Unit 1\nTwo Little Hands\nClap your hands, clap clap clap.\nNew words\nclap, tap\nParts of the Body\nPoint to your nose.\nPicture   Talk\nWhat do you see?";

    #[test]
    fn test_split_lines_and_merge_headers() {
        let topics = TopicSplitter::new().split(CHAPTER);
        let names: Vec<&str> = topics.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["01_Two_Little_Hands", "02_Parts_of_the_Body", "03_Picture_Talk"]);
        assert!(topics[0].text.starts_with("Unit 1\nTwo Little Hands"));
        assert!(topics[0].text.contains("New words\nclap, tap"));
        assert_eq!(topics[2].text, "Picture   Talk\nWhat do you see?");
    }

    #[test]
    fn test_titles_stay_unique_for_repeated_headers() {
        let topics = TopicSplitter::new().split("Let us Read\nOne\nLet us Read\nTwo");
        assert_eq!(topics[0].title(), "01 Let us Read");
        assert_eq!(topics[1].title(), "02 Let us Read");
    }

    #[test]
    fn test_split_pages() {
        let text = "LET US READ\nA story\u{c}more story\u{c}Odd One Out\nCircle it";
        let topics = TopicSplitter::new().split(text);
        assert_eq!(topics.len(), 2);
        assert_eq!(topics[0].name, "01_LET_US_READ");
        assert_eq!(topics[0].text, "LET US READ\nA story\nmore story");
        assert_eq!(topics[1].header, "Odd One Out");
    }

    #[test]
    fn test_merge_header_first_starts_topic() {
        let topics = TopicSplitter::new().split("Sight words\nthe, a");
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].name, "01_Sight_words");
    }

    #[test]
    fn test_no_headers_no_topics() {
        assert!(TopicSplitter::new().split("just some prose\nwith lines").is_empty());
    }

    #[test]
    fn test_custom_pattern() {
        let splitter = TopicSplitter::with_pattern(r"^Lesson \d+").unwrap();
        let topics = splitter.split("lesson 1\nfoo\nLesson 2\nbar");
        assert_eq!(topics.iter().map(|t| t.name.clone()).collect::<Vec<_>>(), vec!["01_lesson_1", "02_Lesson_2"]);
        assert!(TopicSplitter::with_pattern("(").is_err());
    }
}
