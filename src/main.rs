use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use tracing::{debug, info};

use dispatch_assert::query::{self, Namespaces, QueryTarget, SelectorKind};
use dispatch_assert::report::{self, CheckReport};
use dispatch_assert::{Assertion, CheckError, Expectation, HttpControllerTestCase, RouterApplication};

#[derive(Parser)]
#[command(name = "dispatch-assert")]
#[command(about = "Run CSS/XPath queries and assertions against an HTML or XML document")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the nodes a selector matches
    Query {
        /// Document file path, or '-' for stdin
        input: String,

        #[command(flatten)]
        selector: SelectorArgs,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Assert an expectation about the nodes a selector matches
    Check {
        /// Document file path, or '-' for stdin
        input: String,

        #[command(flatten)]
        selector: SelectorArgs,

        #[command(flatten)]
        expectation: ExpectationArgs,

        /// Message printed above the diagnostic on failure
        #[arg(short, long)]
        message: Option<String>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[derive(Args)]
struct SelectorArgs {
    /// CSS selector
    #[arg(long, conflicts_with = "xpath", required_unless_present = "xpath")]
    css: Option<String>,

    /// XPath expression
    #[arg(long)]
    xpath: Option<String>,

    /// Namespace binding for XPath, as prefix=uri (repeatable)
    #[arg(long = "ns", value_parser = parse_binding, requires = "xpath")]
    namespaces: Vec<(String, String)>,
}

impl SelectorArgs {
    fn kind_and_path(&self) -> (SelectorKind, &str) {
        match (&self.css, &self.xpath) {
            (Some(css), _) => (SelectorKind::Css, css),
            (None, Some(xpath)) => (SelectorKind::XPath, xpath),
            (None, None) => (SelectorKind::Css, ""),
        }
    }

    fn namespaces(&self) -> Namespaces {
        self.namespaces.iter().cloned().collect()
    }
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct ExpectationArgs {
    /// At least one node matches
    #[arg(long)]
    exists: bool,

    /// No node matches
    #[arg(long)]
    absent: bool,

    /// Exactly N nodes match
    #[arg(long, value_name = "N")]
    count: Option<usize>,

    /// Anything but exactly N nodes match
    #[arg(long, value_name = "N")]
    not_count: Option<usize>,

    /// At least N nodes match
    #[arg(long, value_name = "N")]
    min: Option<usize>,

    /// At most N nodes match
    #[arg(long, value_name = "N")]
    max: Option<usize>,

    /// Some node's text equals TEXT
    #[arg(long, value_name = "TEXT")]
    contains: Option<String>,

    /// No node's text equals TEXT
    #[arg(long, value_name = "TEXT")]
    not_contains: Option<String>,

    /// Some node's text matches PATTERN
    #[arg(long, value_name = "PATTERN")]
    regex: Option<String>,

    /// No node's text matches PATTERN
    #[arg(long, value_name = "PATTERN")]
    not_regex: Option<String>,
}

impl ExpectationArgs {
    fn into_expectation(self) -> Expectation {
        if self.exists {
            return Expectation::Exists;
        }
        if self.absent {
            return Expectation::NotExists;
        }
        if let Some(n) = self.count {
            return Expectation::Count(n);
        }
        if let Some(n) = self.not_count {
            return Expectation::NotCount(n);
        }
        if let Some(n) = self.min {
            return Expectation::CountMin(n);
        }
        if let Some(n) = self.max {
            return Expectation::CountMax(n);
        }
        if let Some(s) = self.contains {
            return Expectation::ContentContains(s);
        }
        if let Some(s) = self.not_contains {
            return Expectation::NotContentContains(s);
        }
        if let Some(p) = self.regex {
            return Expectation::ContentRegex(p);
        }
        if let Some(p) = self.not_regex {
            return Expectation::NotContentRegex(p);
        }
        Expectation::Exists
    }
}

fn parse_binding(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((prefix, uri)) if !prefix.is_empty() && !uri.is_empty() => {
            Ok((prefix.to_string(), uri.to_string()))
        }
        _ => Err(format!("expected prefix=uri, got {raw:?}")),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Query {
            input,
            selector,
            format,
        } => {
            info!(input = %input, format = %format, "query command");
            run_query(&input, &selector, &format)
        }
        Commands::Check {
            input,
            selector,
            expectation,
            message,
            format,
        } => {
            info!(input = %input, format = %format, "check command");
            let passed = run_check(&input, &selector, expectation.into_expectation(), message, &format)?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn read_input(input: &str) -> Result<String> {
    let document = if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {input}"))?
    };
    debug!(doc_len = document.len(), "document loaded");
    Ok(document)
}

fn run_query(input: &str, selector: &SelectorArgs, format: &str) -> Result<()> {
    let document = read_input(input)?;
    let namespaces = selector.namespaces();
    let (kind, path) = selector.kind_and_path();
    let result = query::execute(QueryTarget::new(&document, &namespaces), kind, path)?;

    let output = match format {
        "json" => serde_json::to_string_pretty(&result)?,
        _ => report::matches_to_text(kind, path, &result),
    };
    print!("{output}");
    Ok(())
}

fn run_check(
    input: &str,
    selector: &SelectorArgs,
    expectation: Expectation,
    message: Option<String>,
    format: &str,
) -> Result<bool> {
    let document = read_input(input)?;
    let (kind, path) = selector.kind_and_path();

    let mut case = HttpControllerTestCase::new(RouterApplication::builder().build()?);
    case.register_xpath_namespaces(selector.namespaces());
    case.response().set_body(document);

    let mut assertion = Assertion::query(kind, path, expectation.clone());
    if let Some(message) = message {
        assertion = assertion.with_message(message);
    }
    let outcome = match case.check(&assertion) {
        Ok(()) => Ok(()),
        Err(CheckError::Failed(failure)) => Err(failure),
        Err(CheckError::Query(err)) => return Err(err.into()),
    };

    let report = CheckReport::new(kind, path, &expectation, outcome);
    let output = match format {
        "json" => serde_json::to_string_pretty(&report)?,
        _ => report::check_to_text(&report),
    };
    println!("{}", output.trim_end());
    Ok(report.passed)
}
