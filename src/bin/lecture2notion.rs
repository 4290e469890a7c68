//! CLI binary for edgequake-lecture2notion.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, drives one run, and prints the result.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::builder::TypedValueParser;
use clap::Parser;
use edgequake_lecture2notion::config::{DEFAULT_CHUNK_SIZE, DEFAULT_MODEL, MAX_CHUNK_SIZE};
use edgequake_lecture2notion::{
    CourseDirectory, ExclusionSelector, FixedExclusions, LecturePipeline, NotionClient,
    OpenAiClient, PdfiumRasterizer, PipelineConfig, PipelineError, PipelineProgressCallback,
    PipelineState, ProgressCallback, RetryScope, RunReport, RunRequest,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

/// Conventional exit status for SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar over the slide loop, with one log line per slide and
/// a spinner message for the summary, questions and delivery stages.
struct CliProgressCallback {
    bar: ProgressBar,
    slide_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering slides…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            slide_started: Mutex::new(None),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} slides  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Explaining");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self) -> f64 {
        self.slide_started
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_pages} slides…"))
        ));
    }

    fn on_state(&self, state: PipelineState) {
        let (prefix, msg) = match state {
            PipelineState::SummaryRequest => ("Summary", "writing lecture summary"),
            PipelineState::QuestionsRequest => ("Questions", "writing practice questions"),
            PipelineState::Delivering => ("Notion", "appending blocks"),
            _ => return,
        };
        self.bar.set_prefix(prefix);
        self.bar.set_message(msg);
    }

    fn on_slide_start(&self, page_num: usize, _total_pages: usize, analyzed: bool) {
        if let Ok(mut s) = self.slide_started.lock() {
            *s = Some(Instant::now());
        }
        let mode = if analyzed { "" } else { " (upload only)" };
        self.bar.set_message(format!("slide {page_num}{mode}"));
    }

    fn on_slide_complete(&self, page_num: usize, _completed: usize, total_pages: usize, blocks: usize) {
        let elapsed = self.elapsed_secs();
        self.bar.println(format!(
            "  {} Slide {:>3}/{:<3}  {:<10}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{blocks:>3} blocks")),
            dim(&format!("{elapsed:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_appended(&self, chunk: usize, total_chunks: usize, _blocks: usize) {
        self.bar.set_message(format!("appended chunk {chunk}/{total_chunks}"));
    }

    fn on_run_complete(&self, report: &RunReport) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} slides ({} explained), {} blocks in {} chunks",
            green("✔"),
            bold(&report.total_pages.to_string()),
            report.analyzed_slides,
            report.total_blocks,
            report.chunks,
        );
    }

    fn on_run_failed(&self, state: PipelineState, error: &str) {
        self.bar.abandon();
        eprintln!("{} Run failed during {}: {}", red("✘"), state, red(error));
    }
}

// ── Interactive slide selection ──────────────────────────────────────────────

/// Asks on stdin which slides to upload without explanation.
struct PromptSelector;

#[async_trait]
impl ExclusionSelector for PromptSelector {
    async fn select(&self, page_images: &[PathBuf]) -> Result<Option<BTreeSet<usize>>, PipelineError> {
        let total = page_images.len();
        if let Some(dir) = page_images.first().and_then(|p| p.parent()) {
            eprintln!("{} {} slides rendered to {}", cyan("◆"), total, dir.display());
        }
        eprint!(
            "Slides to upload without explanation (e.g. 1,4-6; empty for none; q to abort): "
        );
        io::stderr().flush().ok();

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("stdin task panicked: {}", e)))?
        .map_err(|e| PipelineError::Internal(format!("Failed to read selection: {}", e)))?;

        let answer = line.trim();
        if answer.eq_ignore_ascii_case("q") {
            return Ok(None);
        }
        FixedExclusions::parse(answer)?.select(page_images).await
    }
}

// ── CLI definition ───────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Explain every slide of a lecture
  lecture2notion lecture-04.pdf --course Algorithms

  # Upload title and agenda slides without explanation
  lecture2notion lecture-04.pdf --course Algorithms --exclude 1,2

  # Pick slides interactively after rendering
  lecture2notion lecture-04.pdf --course "Machine Learning" --select-slides

  # Show which courses are mapped
  lecture2notion --list-courses

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  OPENAI_BASE_URL         Override the OpenAI endpoint (default https://api.openai.com/v1)
  OPENAI_MODEL            Override the model ID
  NOTION_API_KEY          Notion integration secret
  NOTION_BASE_URL         Override the Notion endpoint (default https://api.notion.com/v1)
  NOTION_PAGE_<COURSE>    Notion page collecting a course's lectures, e.g.
                          NOTION_PAGE_MACHINE_LEARNING=1a2b3c...
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory); system library otherwise

SETUP:
  1. Create a Notion integration and share each course page with it.
  2. export NOTION_API_KEY=secret_... OPENAI_API_KEY=sk-...
  3. export NOTION_PAGE_ALGORITHMS=<page id>
  4. lecture2notion lecture.pdf --course Algorithms
"#;

/// Turn lecture-slide PDFs into annotated Notion pages.
#[derive(Parser, Debug)]
#[command(
    name = "lecture2notion",
    version,
    about = "Turn lecture-slide PDFs into annotated Notion pages using a vision LLM",
    long_about = "Render every slide of a lecture PDF, have a vision-capable model explain each \
one inside a single conversation, add a lecture summary and five practice questions, and write \
everything to a new Notion page under the course page.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Lecture PDF.
    #[arg(required_unless_present = "list_courses")]
    pdf: Option<PathBuf>,

    /// Course name; resolved through NOTION_PAGE_<COURSE>.
    #[arg(short, long, env = "LECTURE2NOTION_COURSE", required_unless_present = "list_courses")]
    course: Option<String>,

    /// Reasoning model ID.
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Slides to upload without explanation: 3, 1,4 or 2-5.
    #[arg(long, conflicts_with = "select_slides")]
    exclude: Option<String>,

    /// Choose slides to upload without explanation interactively.
    #[arg(long)]
    select_slides: bool,

    /// Instruction sent with every slide image.
    #[arg(long, env = "LECTURE2NOTION_INSTRUCTION")]
    instruction: Option<String>,

    /// Path to a text file containing a custom system prompt ({course_name} is substituted).
    #[arg(long, env = "LECTURE2NOTION_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Blocks per Notion append request.
    #[arg(long, env = "LECTURE2NOTION_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE,
          value_parser = clap::value_parser!(u16).range(1..=MAX_CHUNK_SIZE as i64).map(usize::from))]
    chunk_size: usize,

    /// Attempts per network call, including the first.
    #[arg(long, env = "LECTURE2NOTION_MAX_ATTEMPTS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..=10))]
    max_attempts: u32,

    /// Retry every failed call, including permanent 4xx and schema errors.
    #[arg(long)]
    retry_all_errors: bool,

    /// Longest edge of a rendered slide in pixels.
    #[arg(long, env = "LECTURE2NOTION_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// List the courses mapped in the environment and exit.
    #[arg(long)]
    list_courses: bool,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "LECTURE2NOTION_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "LECTURE2NOTION_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "LECTURE2NOTION_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs are noise while the progress bar is drawing.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let courses = CourseDirectory::from_env();

    // ── List-courses mode ────────────────────────────────────────────────
    if cli.list_courses {
        if courses.is_empty() {
            eprintln!("No courses mapped. Set NOTION_PAGE_<COURSE>=<page id>.");
        }
        for course in courses.courses() {
            let page = courses.page_id(&course).unwrap_or_default();
            println!("{:<32} {}", course, dim(page));
        }
        return Ok(());
    }

    let (Some(pdf), Some(course)) = (cli.pdf.clone(), cli.course.clone()) else {
        anyhow::bail!("A PDF path and --course are required");
    };

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    let pipeline = LecturePipeline::new(
        Arc::new(PdfiumRasterizer::new(config.max_rendered_pixels)),
        Arc::new(OpenAiClient::from_env()?),
        Arc::new(NotionClient::from_env()?),
        config,
    );

    let mut request = RunRequest::new(&pdf, &course);
    if let Some(ref instruction) = cli.instruction {
        request = request.with_instruction(instruction);
    }

    let fixed = cli
        .exclude
        .as_deref()
        .map(FixedExclusions::parse)
        .transpose()
        .context("Invalid --exclude")?;
    let selector: Option<&dyn ExclusionSelector> = match (&fixed, cli.select_slides) {
        (Some(fixed), _) => Some(fixed),
        (None, true) => Some(&PromptSelector),
        (None, false) => None,
    };

    // ── Run, cancellable with Ctrl-C ─────────────────────────────────────
    let run = async {
        let Some(ctx) = pipeline
            .prepare(&request, &courses, selector)
            .await
            .context("Run preparation failed")?
        else {
            return Ok(None);
        };
        let report = pipeline.run(&ctx).await.context("Run failed")?;
        Ok::<_, anyhow::Error>(Some(report))
    };

    let outcome = tokio::select! {
        outcome = run => outcome?,
        _ = tokio::signal::ctrl_c() => {
            // A pending stdin read would keep the runtime from shutting down.
            eprintln!("{} Interrupted; blocks already appended stay on the page", red("✗"));
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    };

    let Some(report) = outcome else {
        if !cli.quiet {
            eprintln!("{} Aborted before anything was created", cyan("⚠"));
        }
        return Ok(());
    };

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise run report")?
        );
    } else if !cli.quiet {
        if !show_progress {
            eprintln!(
                "Processed {} slides ({} explained), appended {} blocks in {} chunks",
                report.total_pages, report.analyzed_slides, report.total_blocks, report.chunks
            );
        }
        eprintln!(
            "   page {}  {}ms total",
            bold(&report.page_id),
            dim(&report.total_duration_ms.to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .model(&cli.model)
        .chunk_size(cli.chunk_size)
        .max_attempts(cli.max_attempts)
        .max_rendered_pixels(cli.max_pixels);

    if cli.retry_all_errors {
        builder = builder.retry_scope(RetryScope::AllErrors);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn chunk_size_is_bounded() {
        let cli = Cli::try_parse_from(["lecture2notion", "deck.pdf", "--course", "Algorithms", "--chunk-size", "100"])
            .unwrap();
        assert_eq!(cli.chunk_size, 100);

        let cli = Cli::try_parse_from(["lecture2notion", "deck.pdf", "--course", "Algorithms"]).unwrap();
        assert_eq!(cli.chunk_size, DEFAULT_CHUNK_SIZE);

        for bad in ["0", "101"] {
            assert!(
                Cli::try_parse_from(["lecture2notion", "deck.pdf", "--course", "Algorithms", "--chunk-size", bad]).is_err(),
                "--chunk-size {bad} should be rejected"
            );
        }
    }
}
