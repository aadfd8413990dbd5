//! `multigrade split`: cut a chapter into topics.

use anyhow::Context;
use multigrade_abstraction::{DocumentHandle, TextExtractor};
use multigrade_core::{PlainTextExtractor, Topic, TopicSplitter};
use std::path::Path;

/// Reads `file` and splits it at `pattern`, or at the default headers.
pub fn load_topics(file: &Path, pattern: Option<&str>) -> anyhow::Result<Vec<Topic>> {
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let text = PlainTextExtractor.extract(&DocumentHandle::new(file.display().to_string(), bytes))?;
    let splitter = match pattern {
        Some(pattern) => TopicSplitter::with_pattern(pattern).context("invalid header pattern")?,
        None => TopicSplitter::new(),
    };
    Ok(splitter.split(&text))
}

pub fn execute(file: &Path, pattern: Option<&str>, json_output: bool) -> anyhow::Result<()> {
    let topics = load_topics(file, pattern)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&topics)?);
    } else if topics.is_empty() {
        println!("No topic headers found.");
    } else {
        for topic in &topics {
            println!("{} ({} lines)", topic.name, topic.text.lines().count());
        }
    }
    Ok(())
}
