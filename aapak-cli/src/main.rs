mod info;
mod pack;
mod unpack;

use std::{
    fs::File,
    path::{Path, PathBuf},
    time::Duration,
};

use aapak_core::{FormatDescriptor, PakFile, PakFileBuilder, ProgressPhase, pakfile::DEFAULT_BLOCK_SIZE};
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Format descriptor JSON file, the classic layout is used when omitted
    #[arg(long, global = true)]
    descriptor: Option<PathBuf>,
    /// Payload alignment in bytes
    #[arg(long, global = true, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: u32,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the entries of a PAK file
    List(ListCommand),
    /// Print the directory tree of a PAK file
    Tree(TreeCommand),
    /// Pack a directory into a PAK file
    Pack(PackCommand),
    /// Unpack a PAK file
    Unpack(UnpackCommand),
    /// Delete entries from a PAK file
    Delete(DeleteCommand),
    /// Check the content hash of every entry
    Verify(VerifyCommand),
}

#[derive(Debug, Args)]
struct ListCommand {
    /// Input PAK file path
    input: PathBuf,
    /// Print entries as JSON
    #[arg(long)]
    json: bool,
    /// Include deleted slots
    #[arg(long)]
    deleted: bool,
}

#[derive(Debug, Args)]
struct TreeCommand {
    /// Input PAK file path
    input: PathBuf,
}

#[derive(Debug, Args)]
struct PackCommand {
    /// PAK file to pack into
    output: PathBuf,
    /// Directory whose files are packed, names are relative to it
    input: PathBuf,
    /// Start a new PAK file instead of adding to an existing one
    #[arg(long)]
    create: bool,
}

#[derive(Debug, Args)]
struct UnpackCommand {
    /// Input PAK file path
    input: PathBuf,
    /// Output directory path
    output: Option<PathBuf>,
    /// Only unpack entries whose name matches this regex
    #[arg(long)]
    filter: Option<String>,
    /// Overwrite existing files
    #[arg(long)]
    overwrite: bool,
    /// Keep going when an entry fails
    #[arg(long)]
    continue_on_error: bool,
}

#[derive(Debug, Args)]
struct DeleteCommand {
    /// Input PAK file path
    input: PathBuf,
    /// Entry names to delete
    #[arg(required = true)]
    names: Vec<String>,
}

#[derive(Debug, Args)]
struct VerifyCommand {
    /// Input PAK file path
    input: PathBuf,
}

impl Cli {
    fn builder(&self) -> anyhow::Result<PakFileBuilder> {
        let mut builder = PakFileBuilder::new().block_size(self.block_size);
        if let Some(path) = &self.descriptor {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read descriptor `{}`", path.display()))?;
            let descriptor = FormatDescriptor::from_json(&json).context("Invalid format descriptor")?;
            builder = builder.descriptor(descriptor);
        }
        Ok(builder)
    }

    fn open(&self, path: &Path) -> anyhow::Result<PakFile<File>> {
        let bar = phase_bar();
        let pak = self
            .builder()?
            .on_progress(report_to(bar.clone()))
            .open_path(path)
            .with_context(|| format!("Failed to open PAK file `{}`", path.display()))?;
        bar.finish_and_clear();
        Ok(pak)
    }
}

fn phase_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg:>22} {wide_bar} {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Feeds engine progress notifications into a progress bar.
fn report_to(bar: ProgressBar) -> impl FnMut(ProgressPhase, usize, usize) + Send + 'static {
    move |phase, step, maximum| {
        bar.set_message(format!("{phase:?}"));
        bar.set_length(maximum as u64);
        bar.set_position(step as u64);
    }
}

/// Closes the PAK with a progress bar for the FAT and header writes.
fn close(mut pak: PakFile<File>) -> anyhow::Result<()> {
    let bar = phase_bar();
    pak.set_progress_handler(report_to(bar.clone()));
    pak.close().context("Failed to write PAK file")?;
    bar.finish_and_clear();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::List(cmd) => info::list(&cli, cmd),
        Command::Tree(cmd) => info::tree(&cli, cmd),
        Command::Pack(cmd) => pack::package(&cli, cmd),
        Command::Unpack(cmd) => unpack::unpack(&cli, cmd),
        Command::Delete(cmd) => info::delete(&cli, cmd),
        Command::Verify(cmd) => info::verify(&cli, cmd),
    }
}
