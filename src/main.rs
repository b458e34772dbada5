use clap::Parser;
use notebookgen::{NotebookConfig, NotebookOptions, Result, render_document};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const LONG_HELP: &str = r#"
Recognized files:
  .cc .cpp .hpp   C++ listing
  .c              C listing
  .java           Java listing
  .py             Python listing
  .go             Go listing
  .tex            embedded as raw LaTeX
  Hidden files and folders (name starting with '.') are skipped.

Requirements:
  latexmk and XeLaTeX with the minted package (and Pygments) on PATH.

Examples:
  # Build ./notebook.pdf from the library folder
  notebookgen library -a "Team Rocket" -i TR
  # A4 paper, two columns, 10pt font, custom output
  notebookgen library -p a4 -c 2 -s 10 -o team.pdf
  # Add a cover image
  notebookgen library -I logo.png
  # Stable ordering, skipping tests
  notebookgen library --sort -x '**/tests'
  # Print the generated LaTeX instead of compiling
  notebookgen library --dry-run
  # Stream the PDF to stdout
  notebookgen library -o - > notebook.pdf
  # Options from a JSON file (command-line flags take precedence)
  notebookgen library --config notebook.json
"#;

/// Code notebook generator.
///
/// Copyright 2026 the notebookgen authors.
/// Licensed under the EUPL v1.2.
#[derive(Parser, Debug)]
#[command(
    name = "notebookgen",
    version,
    about = "Turn a directory of source code into a printable code notebook.",
    after_long_help = LONG_HELP
)]
struct Cli {
    /// Directory whose source files make up the notebook
    #[arg(value_name = "ROOT")]
    root: PathBuf,

    /// Output PDF ('-' for stdout) [default: ./notebook.pdf]
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Author name shown in the page header
    #[arg(short, long)]
    author: Option<String>,

    /// Initials shown in the page header
    #[arg(short, long)]
    initials: Option<String>,

    /// Font size, in points ('pt' is added when missing) [default: 8]
    #[arg(short, long)]
    size: Option<String>,

    /// Number of text columns [default: 3]
    #[arg(short, long)]
    columns: Option<u32>,

    /// Paper size, e.g. letter or a4 [default: letter]
    #[arg(short, long)]
    paper: Option<String>,

    /// Cover image placed above the table of contents
    #[arg(short = 'I', long, value_name = "FILE")]
    image: Option<PathBuf>,

    /// Custom LaTeX header template
    #[arg(long, value_name = "FILE")]
    template: Option<PathBuf>,

    /// JSON options file
    #[arg(long, value_name = "FILE", env = "NOTEBOOKGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Exclude glob patterns relative to ROOT (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "GLOB", action = clap::ArgAction::Append)]
    exclude: Vec<String>,

    /// Order entries by name instead of filesystem order
    #[arg(long)]
    sort: bool,

    /// Make-mode LaTeX driver to run
    #[arg(long, value_name = "PROGRAM", env = "NOTEBOOKGEN_COMPILER")]
    compiler: Option<String>,

    /// Kill the compiler after this many seconds (only the driver process;
    /// engine runs it already started are not tracked)
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Keep the scratch directory when no PDF is produced
    #[arg(long)]
    keep_scratch: bool,

    /// Print the generated LaTeX to stdout instead of compiling it
    #[arg(long)]
    dry_run: bool,

    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn options(&self) -> NotebookOptions {
        NotebookOptions {
            output: self.output.clone(),
            author: self.author.clone(),
            initials: self.initials.clone(),
            size: self.size.clone(),
            columns: self.columns,
            paper: self.paper.clone(),
            image: self.image.clone(),
            template: self.template.clone(),
            exclude: self.exclude.clone(),
            sort: self.sort.then_some(true),
            compiler: self.compiler.clone(),
            compiler_args: None,
            timeout_secs: self.timeout,
            keep_scratch: self.keep_scratch.then_some(true),
        }
    }

    fn log_level(&self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::ERROR,
            (false, 0) => LevelFilter::WARN,
            (false, 1) => LevelFilter::INFO,
            (false, 2) => LevelFilter::DEBUG,
            (false, _) => LevelFilter::TRACE,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    // stdout may carry the PDF or the LaTeX source, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(cli.log_level().into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let options = match &cli.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "reading options file");
            NotebookOptions::from_json_file(path)?.merge(cli.options())
        }
        None => cli.options(),
    };
    let config = NotebookConfig::from_options(options)?;

    if cli.dry_run {
        let document = render_document(&cli.root, &config)?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(document.as_bytes())?;
        stdout.flush()?;
        return Ok(());
    }

    notebookgen::generate_notebook(&cli.root, &config).await?;
    Ok(())
}
