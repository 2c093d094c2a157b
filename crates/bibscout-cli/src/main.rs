use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use bibscout_core::config_file::load_config;
use bibscout_core::{
    AssemblyContext, DocumentContext, HttpFetcher, Resolution, Resolver,
};

mod output;

use output::ColorMode;

/// Resolve bibliographic metadata for a document and emit an enriched record
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a plain-text extraction of the document
    #[arg(long)]
    text: Option<PathBuf>,

    /// Known title, used as an exact-phrase query
    #[arg(long)]
    title: Option<String>,

    /// Known DOI, used verbatim as the query
    #[arg(long)]
    doi: Option<String>,

    /// Path to the source document, recorded as provenance
    /// (file reference, checksum, inode)
    #[arg(long)]
    file: Option<PathBuf>,

    /// Netscape-format cookie file to seed the session from
    #[arg(long)]
    cookie_file: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Path to write the record to (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    if cli.text.is_none() && cli.title.is_none() && cli.doi.is_none() {
        anyhow::bail!("nothing to resolve: pass at least one of --text, --title, --doi");
    }

    // Resolve configuration: CLI flags > config files > defaults
    let (mut config, mut session) = load_config().into_parts();
    if let Some(secs) = cli.timeout {
        config.timeout_secs = secs;
    }
    if let Some(path) = cli.cookie_file {
        session.cookie_file = Some(path);
    }

    let text = match cli.text {
        Some(ref path) => Some(
            std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?,
        ),
        None => None,
    };

    let ctx = DocumentContext {
        text,
        title_hint: cli.title,
        doi_hint: cli.doi,
        file_ref: cli.file.as_ref().map(|p| p.display().to_string()),
    };

    let extras = AssemblyContext {
        checksum: cli.file.as_deref().map(checksum).transpose()?,
        timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        file_inode: cli.file.as_deref().and_then(inode),
        ..AssemblyContext::default()
    };

    let use_color = !cli.no_color && cli.output.is_none();
    let color = ColorMode(use_color);

    let fetcher = HttpFetcher::new(&session, Duration::from_secs(config.timeout_secs))?;
    let resolver = Resolver::new(config, &fetcher).with_event_handler(move |event| {
        let mut stderr = std::io::stderr();
        let _ = output::print_event(&mut stderr, &event, color);
        let _ = stderr.flush();
    });

    match resolver.resolve(&ctx, &extras).await? {
        Resolution::Resolved(record) => {
            output::print_summary(&mut std::io::stderr(), &record, color)?;
            match cli.output {
                Some(ref path) => std::fs::write(path, &record.text)?,
                None => print!("{}", record.text),
            }
            Ok(true)
        }
        Resolution::Unresolved { trail } => {
            let mut stderr = std::io::stderr();
            writeln!(stderr, "unresolved; attempt trail:")?;
            for line in &trail {
                writeln!(stderr, "  {line}")?;
            }
            Ok(false)
        }
    }
}

fn checksum(path: &std::path::Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

#[cfg(unix)]
fn inode(path: &std::path::Path) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(path).ok().map(|m| m.ino())
}

#[cfg(not(unix))]
fn inode(_path: &std::path::Path) -> Option<u64> {
    None
}
