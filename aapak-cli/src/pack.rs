use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use aapak_core::PakFile;
use aapak_core::pak::{datetime_to_filetime, filetime_now};
use aapak_core::store::PakStore;
use anyhow::Context;
use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressStyle};

use crate::{Cli, PackCommand};

pub fn package(cli: &Cli, cmd: &PackCommand) -> anyhow::Result<()> {
    let inputs = collect_inputs(&cmd.input)?;
    if inputs.is_empty() {
        anyhow::bail!("No input files found");
    }

    let mut pak = if cmd.create {
        if let Some(parent) = cmd.output.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }
        cli.builder()?
            .create_path(&cmd.output)
            .with_context(|| format!("Failed to create PAK file `{}`", cmd.output.display()))?
    } else {
        cli.open(&cmd.output)?
    };

    let bar = ProgressBar::new(inputs.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar().template("{pos}/{len} files packed {wide_bar} elapsed: {elapsed} eta: {eta}")?,
    );
    bar.enable_steady_tick(Duration::from_millis(100));

    // files packed before a failure are still committed
    let packed = pack_inputs(&mut pak, &inputs, &bar);
    bar.finish_and_clear();
    crate::close(pak)?;
    let (added, replaced) = packed?;

    println!("Output file: {}", cmd.output.display());
    println!("Done! {added} added, {replaced} replaced.");

    Ok(())
}

/// Packs new names and replaces existing ones. Returns the added and replaced counts.
fn pack_inputs<S: PakStore>(
    pak: &mut PakFile<S>,
    inputs: &IndexMap<String, PathBuf>,
    bar: &ProgressBar,
) -> anyhow::Result<(usize, usize)> {
    let (mut added, mut replaced) = (0usize, 0usize);
    for (name, path) in inputs {
        let data = std::fs::read(path).with_context(|| format!("Failed to read `{}`", path.display()))?;
        let (create_time, modify_time) = file_times(path);
        tracing::debug!(%name, size = data.len(), "packing file");

        if pak.exists(name) {
            pak.replace(name, &data, modify_time)
                .with_context(|| format!("Failed to replace `{name}`"))?;
            replaced += 1;
        } else {
            pak.pack(name, &data, create_time, modify_time)
                .with_context(|| format!("Failed to pack `{name}`"))?;
            added += 1;
        }
        bar.inc(1);
    }
    Ok((added, replaced))
}

/// FILETIME pair for a loose file, falling back to now when the platform has no such time.
fn file_times(path: &Path) -> (i64, i64) {
    let to_filetime = |time: std::io::Result<SystemTime>| time.map(|t| datetime_to_filetime(t.into())).ok();
    match std::fs::metadata(path) {
        Ok(meta) => {
            let modified = to_filetime(meta.modified()).unwrap_or_else(filetime_now);
            let created = to_filetime(meta.created()).unwrap_or(modified);
            (created, modified)
        }
        Err(_) => (filetime_now(), filetime_now()),
    }
}

/// Collect files under the input directory, keyed by their entry name.
fn collect_inputs(input_dir: impl AsRef<Path>) -> anyhow::Result<IndexMap<String, PathBuf>> {
    let mut files = IndexMap::new();

    let input_dir = input_dir.as_ref();
    if !input_dir.is_dir() {
        anyhow::bail!("Input directory does not exist: {}", input_dir.display());
    }

    for entry in walkdir::WalkDir::new(input_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(input_dir)?;
        let name = relative.to_string_lossy().replace('\\', "/");
        files.insert(name, entry.path().to_path_buf());
    }

    Ok(files)
}
