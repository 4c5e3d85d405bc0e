//! `tabula` -- translate an Excel spreadsheet through a translation backend.
//!
//! Uploads the file, follows the job's progress on a single terminal line
//! and writes `translated_<name>.xlsx` into the output directory. Ctrl-C
//! cancels the job.
//!
//! Backend selection comes from flags or the environment (a `.env` file
//! is honoured); see [`config`].

mod config;
mod view;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tabula_core::languages::{is_known_language, language_name, SUPPORTED_LANGUAGES};
use tabula_core::naming::format_file_size;
use tabula_core::submission::{validate_spreadsheet, Submission, AUTO_DETECT};
use tabula_tracker::Outcome;

use crate::config::BackendArgs;
use crate::view::TerminalView;

#[derive(Debug, Parser)]
#[command(name = "tabula", version, about = "Translate Excel spreadsheets")]
struct Args {
    /// Spreadsheet to translate (.xls or .xlsx).
    #[arg(required_unless_present = "list_languages")]
    input: Option<PathBuf>,

    /// Source language code, or `auto` to let the backend detect it.
    #[arg(short, long, default_value = AUTO_DETECT)]
    source: String,

    /// Target language code.
    #[arg(short, long, default_value = "en")]
    target: String,

    /// Directory the translated file is written to.
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Print the supported language codes and exit.
    #[arg(long)]
    list_languages: bool,

    #[command(flatten)]
    backend: BackendArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tabula_cli=info,tabula_tracker=info,tabula_backend=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    if args.list_languages {
        for (code, name) in SUPPORTED_LANGUAGES {
            println!("{code:<4} {name}");
        }
        return Ok(());
    }

    let Some(input) = args.input.as_ref() else {
        bail!("an input spreadsheet is required");
    };
    run(&args, input).await
}

async fn run(args: &Args, input: &Path) -> anyhow::Result<()> {
    let filename = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} is not a file", input.display()))?;
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;

    validate_spreadsheet(&filename, bytes.len() as u64, args.backend.backend_style.max_upload_bytes())?;
    for code in [&args.source, &args.target] {
        if code != AUTO_DETECT && !is_known_language(code) {
            tracing::warn!(code = %code, "Language code not in the known list, sending anyway");
        }
    }

    eprintln!(
        "{filename} ({}) {} -> {}",
        format_file_size(bytes.len() as u64),
        language_name(&args.source).unwrap_or(args.source.as_str()),
        language_name(&args.target).unwrap_or(args.target.as_str()),
    );

    tracing::info!(
        backend_url = %args.backend.backend_url,
        style = ?args.backend.backend_style,
        "Starting tabula",
    );

    let tracker = args.backend.build_tracker(Arc::new(TerminalView::new()));
    let submission = Submission::new(filename, bytes, args.source.as_str(), args.target.as_str());
    let handle = tracker.submit(submission).await?;
    tracker.track(&handle).await?;

    let outcome = tokio::select! {
        outcome = tracker.wait() => outcome?,
        _ = tokio::signal::ctrl_c() => {
            tracker.cancel().await;
            Outcome::Cancelled
        }
    };

    match outcome {
        Outcome::Succeeded => {
            let file = tracker.fetch_result(&handle).await?;
            tokio::fs::create_dir_all(&args.output_dir)
                .await
                .with_context(|| format!("failed to create {}", args.output_dir.display()))?;
            let path = args.output_dir.join(&file.file_name);
            tokio::fs::write(&path, &file.bytes)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{}", path.display());
            Ok(())
        }
        Outcome::Failed { message, .. } => bail!("{message}"),
        Outcome::Cancelled => bail!("translation cancelled"),
    }
}
