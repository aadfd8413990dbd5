//! `multigrade generate`: run one agent and print the result, for one topic
//! or for every topic of a chapter file.

use anyhow::{Context, bail};
use clap::Args;
use colored::Colorize;
use multigrade_abstraction::{DocumentHandle, TextExtractor};
use multigrade_core::{
    AgentKind, ContentId, GradeSet, MultigradeConfig, PlainTextExtractor, RequestContext,
    render_markdown,
};
use multigrade_orchestrator::{BatchReport, GenerationOutcome, OutcomeStatus, TopicResult};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::split;

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Agent to run (course_planner, activity, worksheet, assessment, visual_aid, peer)
    #[arg(short, long)]
    pub agent: AgentKind,

    /// Grades in the class, e.g. "1,2,3"
    #[arg(short, long)]
    pub grades: String,

    #[arg(short, long)]
    pub subject: String,

    /// Topic name; defaults to the chapter file name in batch mode
    #[arg(short, long, required_unless_present = "chapter_file")]
    pub topic: Option<String>,

    #[arg(long)]
    pub chapter: Option<String>,

    /// Number of students
    #[arg(long)]
    pub class_size: Option<u32>,

    /// Session length in minutes
    #[arg(long)]
    pub duration: Option<u32>,

    /// Learning objective; may be repeated
    #[arg(long = "objective")]
    pub objectives: Vec<String>,

    /// Extra classroom parameter as key=value; may be repeated
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, String)>,

    /// Text file with the source material for the topic
    #[arg(long)]
    pub source_file: Option<PathBuf>,

    /// Content id to create a new version of
    #[arg(long)]
    pub prior: Option<ContentId>,

    /// Chapter text file; generates for each topic not yet stored
    #[arg(long, conflicts_with_all = ["source_file", "prior"])]
    pub chapter_file: Option<PathBuf>,

    /// Topic header regex used with --chapter-file
    #[arg(long, requires = "chapter_file")]
    pub header_pattern: Option<String>,

    /// Print the full outcome as JSON
    #[arg(long)]
    pub json: bool,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw.split_once('=').ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

pub fn build_context(args: &GenerateArgs) -> anyhow::Result<RequestContext> {
    let grades = GradeSet::parse_list(&args.grades)?;
    let topic = match (&args.topic, &args.chapter_file) {
        (Some(topic), _) => topic.clone(),
        (None, Some(file)) => file.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default(),
        (None, None) => bail!("--topic is required"),
    };
    let mut builder = RequestContext::builder(grades, args.subject.as_str(), topic);
    if let Some(chapter) = &args.chapter {
        builder = builder.chapter(chapter.as_str());
    }
    if let Some(size) = args.class_size {
        builder = builder.class_size(size);
    }
    if let Some(minutes) = args.duration {
        builder = builder.duration_minutes(minutes);
    }
    if !args.objectives.is_empty() {
        builder = builder.learning_objectives(args.objectives.join("; "));
    }
    for (key, value) in &args.params {
        builder = builder.param(key.as_str(), value.as_str());
    }
    if let Some(path) = &args.source_file {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let name = path.display().to_string();
        let text = PlainTextExtractor.extract(&DocumentHandle::new(name, bytes))?;
        builder = builder.source_text(text);
    }
    Ok(builder.build()?)
}

pub async fn execute(config: &MultigradeConfig, args: GenerateArgs) -> anyhow::Result<()> {
    let context = build_context(&args)?;
    let orchestrator = multigrade_orchestrator::from_config(config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    if let Some(file) = &args.chapter_file {
        let topics = split::load_topics(file, args.header_pattern.as_deref())?;
        if topics.is_empty() {
            bail!("no topic headers found in {}", file.display());
        }
        info!(agent_kind = %args.agent, topics = topics.len(), "Running agent over chapter");
        let report = orchestrator.run_batch(args.agent, &context, &topics, &cancel).await;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_report(&report);
        }
        if report.cancelled {
            bail!("cancelled after {} of {} topic(s)", report.topics.len(), topics.len());
        }
        if report.failed() > 0 {
            bail!("{} topic(s) failed", report.failed());
        }
        return Ok(());
    }

    info!(agent_kind = %args.agent, backend = %config.backend.kind, "Running agent");
    let outcome = orchestrator.run_with_cancellation(args.agent, context, args.prior, &cancel).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    if outcome.status == OutcomeStatus::Failed {
        bail!("generation failed: {}", outcome.diagnostic.as_deref().unwrap_or("unknown error"));
    }
    Ok(())
}

fn print_outcome(outcome: &GenerationOutcome) {
    let status = match outcome.status {
        OutcomeStatus::Success => "success".green(),
        OutcomeStatus::Degraded => "degraded".yellow(),
        OutcomeStatus::Failed => "failed".red(),
    };
    println!("Status: {status} ({} attempt(s))", outcome.attempts);
    if let Some(diagnostic) = &outcome.diagnostic {
        println!("Diagnostic: {diagnostic}");
    }
    if let Some(content) = &outcome.artifact {
        println!("Content ID: {}", content.content_id);
        println!("Version: {}", content.version_number);
        match &outcome.stored_at {
            Some(path) => println!("Stored at: {path}"),
            None => println!("{}", "Not stored".yellow()),
        }
        println!();
        println!("{}", render_markdown(&content.artifact));
    }
}

fn print_report(report: &BatchReport) {
    for entry in &report.topics {
        match &entry.result {
            TopicResult::Skipped { existing } => {
                println!("{} {} (exists: {existing})", "skipped".cyan(), entry.topic);
            }
            TopicResult::Generated(outcome) => {
                let status = match outcome.status {
                    OutcomeStatus::Success => "success".green(),
                    OutcomeStatus::Degraded => "degraded".yellow(),
                    OutcomeStatus::Failed => "failed".red(),
                };
                match (&outcome.stored_at, &outcome.diagnostic) {
                    (Some(path), _) => println!("{status} {} -> {path}", entry.topic),
                    (None, Some(diagnostic)) => println!("{status} {}: {diagnostic}", entry.topic),
                    (None, None) => println!("{status} {}", entry.topic),
                }
            }
        }
    }
    println!(
        "Generated {}, skipped {}, failed {}",
        report.generated(),
        report.skipped(),
        report.failed()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("tone = playful").unwrap(), ("tone".into(), "playful".into()));
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn test_chapter_file_stands_in_for_topic() {
        use clap::Parser;

        #[derive(Parser)]
        struct Cli {
            #[command(flatten)]
            args: GenerateArgs,
        }

        let cli = Cli::try_parse_from([
            "multigrade", "--agent", "worksheet", "--grades", "1,2", "--subject", "English",
            "--chapter-file", "unit_1.txt",
        ])
        .unwrap();
        assert_eq!(build_context(&cli.args).unwrap().topic(), "unit_1");

        let missing = Cli::try_parse_from(["multigrade", "--agent", "worksheet", "--grades", "1", "--subject", "English"]);
        assert!(missing.is_err());
    }
}
