use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use aapak_core::extract::{ExtractBuilder, ExtractEvent};
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;

use crate::{Cli, UnpackCommand};

fn output_path(output: &Option<PathBuf>, input: &Path) -> PathBuf {
    if let Some(output) = output {
        // specified output directory
        output.clone()
    } else if let Some(parent) = input.parent() {
        // relative to input directory
        let dir_name = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or("output".to_string());
        parent.join(dir_name)
    } else {
        // current directory
        ".".into()
    }
}

pub fn unpack(cli: &Cli, cmd: &UnpackCommand) -> anyhow::Result<()> {
    let filter = cmd
        .filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("Invalid --filter regex")?;

    let mut pak = cli.open(&cmd.input)?;
    let output_path = output_path(&cmd.output, &cmd.input);

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar().template("{pos}/{len} files written {wide_bar} elapsed: {elapsed} eta: {eta}")?,
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.println(format!("Output directory: `{}`", output_path.display()));

    let mut extractor = ExtractBuilder::new(&mut pak, &output_path)
        .overwrite(cmd.overwrite)
        .continue_on_error(cmd.continue_on_error)
        .on_event(|event| match event {
            ExtractEvent::Start { total } => bar.set_length(total as u64),
            ExtractEvent::FileDone {
                name, error: Some(e), ..
            } => bar.println(format!("Error processing entry `{name}`: {e}")),
            ExtractEvent::FileDone { .. } => bar.inc(1),
            _ => {}
        });
    if let Some(filter) = filter {
        extractor = extractor.filter(move |entry| filter.is_match(entry.name()));
    }

    let report = extractor.run()?;
    bar.finish();

    if report.failed > 0 {
        println!("Done with {} errors", report.failed);
    } else {
        println!("Done. {} files written, {} skipped.", report.extracted, report.skipped);
    }

    crate::close(pak)
}
