use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use bouncetag_engine::{tag_summary, LlmClassifier, RuleSet, Tagger};
use bouncetag_import::{read_statement, write_statement};

#[derive(Parser, Debug)]
#[command(name = "bouncetag", version, about = "Tag bank-statement rows with bounce types")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tag a statement CSV and write the annotated copy
    Tag {
        /// Input statement CSV
        input: PathBuf,

        /// Output path (default: <input>_tagged.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rule document in TOML (default: built-in rules)
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Narration classification strategy
        #[arg(long, value_enum, default_value_t = ClassifierKind::Rules)]
        classifier: ClassifierKind,

        /// Print per-label counts after tagging
        #[arg(long)]
        summary: bool,
    },

    /// List configured categories in precedence order
    Categories {
        /// Rule document in TOML (default: built-in rules)
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ClassifierKind {
    /// Keyword rules (deterministic, offline)
    Rules,
    /// Delegate narration decisions to a chat-completions model
    Llm,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match Cli::parse().command {
        Command::Tag {
            input,
            output,
            rules,
            classifier,
            summary,
        } => run_tag(input, output, rules, classifier, summary),
        Command::Categories { rules } => run_categories(rules),
    }
}

fn load_rules(path: Option<&Path>) -> Result<RuleSet> {
    match path {
        Some(path) => RuleSet::load(path)
            .with_context(|| format!("loading rules from {}", path.display())),
        None => RuleSet::builtin().context("loading built-in rules"),
    }
}

fn run_tag(
    input: PathBuf,
    output: Option<PathBuf>,
    rules: Option<PathBuf>,
    classifier: ClassifierKind,
    summary: bool,
) -> Result<()> {
    let rules = load_rules(rules.as_deref())?;

    let file = File::open(&input).with_context(|| format!("opening {}", input.display()))?;
    let mut statement =
        read_statement(file).with_context(|| format!("reading {}", input.display()))?;

    let tagger = Tagger::new(rules);
    match classifier {
        ClassifierKind::Rules => tagger.tag(&mut statement.records),
        ClassifierKind::Llm => {
            let api_key = std::env::var("OPENROUTER_API_KEY")
                .context("OPENROUTER_API_KEY is required for --classifier llm")?;
            let llm = LlmClassifier::new(api_key).context("building model client")?;
            tagger.tag_with(&llm, &mut statement.records);
        }
    }

    let output = output.unwrap_or_else(|| default_output(&input));
    let out = File::create(&output).with_context(|| format!("creating {}", output.display()))?;
    write_statement(&statement, out)
        .with_context(|| format!("writing {}", output.display()))?;

    println!("Tagged {} records -> {}", statement.len(), output.display());
    if summary {
        for (label, count) in tag_summary(&statement.records) {
            println!("{count:>6}  {label}");
        }
    }
    Ok(())
}

fn run_categories(rules: Option<PathBuf>) -> Result<()> {
    let rules = load_rules(rules.as_deref())?;
    for (i, rule) in rules.categories().iter().enumerate() {
        println!("{:>2}. {}", i + 1, rule.label);
    }
    println!(
        "loan keywords: {}",
        rules
            .loan_terms()
            .iter()
            .map(|t| t.text())
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("statement");
    input.with_file_name(format!("{stem}_tagged.csv"))
}
