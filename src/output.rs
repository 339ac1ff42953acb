use std::io::{self, Write};

use serde::Serialize;

use crate::layout::LayoutPlan;
use crate::report::{
    BuildResult, ClassifyResult, FieldSummary, FindResult, KindInfo, ProgressEvent, ProgressSink,
};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_classify(result: &ClassifyResult<'_>) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_plan(plan: &LayoutPlan) -> io::Result<()> {
        Self::print_json(plan)
    }

    pub fn print_build(result: &BuildResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_find(result: &FindResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_kinds(kinds: &[KindInfo]) -> io::Result<()> {
        Self::print_json(&kinds)
    }

    fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Progress lines on stderr for interactive runs.
pub struct TextProgress;

impl ProgressSink for TextProgress {
    fn event(&self, event: ProgressEvent) {
        let mut stderr = io::stderr();
        let _ = match event.elapsed {
            Some(elapsed) => writeln!(stderr, "{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => writeln!(stderr, "{}", event.message),
        };
    }
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

pub struct TextOutput;

impl TextOutput {
    pub fn print_build(result: &BuildResult) {
        println!("{CYAN}{} ({}){RESET}", result.name, result.kind.label());
        match &result.url {
            Some(url) => println!("{GREEN}{}: {url}{RESET}", result.action),
            None => println!(
                "{YELLOW}{}: {} structural requests, {} value ranges{RESET}",
                result.action, result.structural_requests, result.value_ranges
            ),
        }
        Self::print_fields(&result.fields);
    }

    pub fn print_fields(fields: &[FieldSummary]) {
        for field in fields {
            println!("{CYAN}{}{RESET}: {} classified", field.field, field.classified);
            for bucket in &field.buckets {
                println!("   {:>4}  {}", bucket.count, bucket.label);
            }
            if field.unclassified > 0 {
                println!("{YELLOW}   {:>4}  unclassified{RESET}", field.unclassified);
            }
        }
    }

    pub fn print_find(result: &FindResult) {
        println!("{GREEN}{}{RESET}", result.name);
        println!("   id: {}", result.file_id);
        println!("   {}", result.url);
    }

    pub fn print_kinds(kinds: &[KindInfo]) {
        for info in kinds {
            println!("{CYAN}{}{RESET} ({})", info.kind, info.label);
            for rules in &info.fields {
                let buckets = rules
                    .buckets
                    .iter()
                    .map(|bucket| bucket.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("   {}: {buckets}", rules.field);
            }
        }
    }
}
