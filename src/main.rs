//! CLI entry point for `nsx2md`.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use nsx2md::config::{self, Config};
use nsx2md::converter::pandoc::Pandoc;
use nsx2md::export::archive::{find_archives, is_archive, ArchiveConverter, ArchiveReport};

#[derive(Parser)]
#[command(
    name = "nsx2md",
    version,
    about = "Convert Synology Note Station (.nsx) exports to Markdown notebooks"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Archives to convert (default: every .nsx file in the working directory)
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Directory where notebook folders are created
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Exit without waiting for Enter
    #[arg(long)]
    no_pause: bool,

    /// Write the default configuration file and exit
    #[arg(long)]
    init_config: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Print a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Completions { shell }) => return cmd_completions(shell),
        Some(Commands::Manpage) => return cmd_manpage(),
        None => {}
    }

    if cli.init_config {
        let path = config::save_config(&Config::default(), cli.config.as_deref())?;
        println!("  Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let pause = config.general.pause_on_exit && !cli.no_pause;
    let result = cmd_convert(&cli.files, cli.output.as_deref(), &config);
    if pause && result.is_ok() {
        wait_for_enter();
    }
    result
}

/// Log to stderr, and to `nsx2md.log` in the cache directory when it is writable.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "nsx2md.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Print a completion script for `shell`.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "nsx2md", &mut std::io::stdout());
    Ok(())
}

/// Print the roff man page.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Convert the given archives, or every archive in the working directory.
fn cmd_convert(files: &[PathBuf], output: Option<&Path>, config: &Config) -> anyhow::Result<()> {
    let pandoc = Pandoc::from_config(&config.converter)?;
    println!("  Found pandoc {}", pandoc.version());

    let cwd = std::env::current_dir()?;
    let archives: Vec<PathBuf> = if files.is_empty() {
        find_archives(&cwd)?
    } else {
        files
            .iter()
            .filter(|p| {
                let keep = is_archive(p);
                if !keep {
                    tracing::warn!(path = %p.display(), "Skipping file without .nsx extension");
                }
                keep
            })
            .cloned()
            .collect()
    };
    if archives.is_empty() {
        anyhow::bail!("No .nsx archives given");
    }

    let output_root = output
        .map(Path::to_path_buf)
        .or_else(|| config.general.output_dir.clone())
        .unwrap_or(cwd);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} notes")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let mut converter = ArchiveConverter::new(config, pandoc, output_root);
    let results = converter.convert_all(
        &archives,
        Some(&|path: &Path, current: usize, total: usize| {
            pb.set_message(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            );
            pb.set_length(total as u64);
            pb.set_position(current as u64);
        }),
    );
    pb.finish_and_clear();

    for (path, result) in archives.iter().zip(results) {
        match result {
            Ok(report) => print_report(&report),
            Err(e) => {
                println!();
                println!("  {}: {}", path.display(), e);
            }
        }
    }
    println!();

    Ok(())
}

/// Print the per-archive summary.
fn print_report(report: &ArchiveReport) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<25} {}", "Archive", report.archive.display());
    println!("  {:<25} {}", "Notebooks", report.notebook_count());
    println!(
        "  {:<25} {} / {}",
        "Converted notes", report.converted, report.total_notes
    );
    println!(
        "  {:<25} {} ({})",
        "Attachments written",
        report.attachments_written,
        format_size(report.bytes_written, BINARY)
    );
    if report.attachments_from_source > 0 {
        println!(
            "  {:<25} {}",
            "Linked to source URL", report.attachments_from_source
        );
    }
    if report.attachments_missing > 0 {
        println!("  {:<25} {}", "Attachments not found", report.attachments_missing);
    }

    if !report.unconverted.is_empty() {
        println!();
        println!("  Notes not converted:");
        for note in &report.unconverted {
            println!("    {note}");
        }
    }
}

fn wait_for_enter() {
    if !std::io::stdin().is_terminal() {
        return;
    }
    println!("  Conversion finished. Press Enter to quit...");
    let mut line = String::new();
    let _ = std::io::stdin().read_line(&mut line);
}
