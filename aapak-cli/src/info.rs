use aapak_core::{Entry, directory::PATH_SEPARATOR};
use anyhow::Context;

use crate::{Cli, DeleteCommand, ListCommand, TreeCommand, VerifyCommand};

pub fn list(cli: &Cli, cmd: &ListCommand) -> anyhow::Result<()> {
    let pak = cli.open(&cmd.input)?;
    let entries = pak.list()?;
    let deleted: Vec<&Entry> = if cmd.deleted {
        pak.deleted_entries()?.iter().collect()
    } else {
        vec![]
    };

    if cmd.json {
        let json = if cmd.deleted {
            serde_json::json!({ "entries": entries, "deleted": deleted })
        } else {
            serde_json::to_value(&entries)?
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    for entry in &entries {
        print_entry(entry);
    }
    if !deleted.is_empty() {
        println!("-- deleted slots --");
        for entry in &deleted {
            print_entry(entry);
        }
    }
    println!(
        "{} files, {} bytes",
        entries.len(),
        pak.index()?.total_size()
    );
    Ok(())
}

fn print_entry(entry: &Entry) {
    let modified = entry
        .modified_at()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:>12} {:>12} {:>19}  {}",
        entry.offset(),
        entry.size(),
        modified,
        entry.name()
    );
}

pub fn tree(cli: &Cli, cmd: &TreeCommand) -> anyhow::Result<()> {
    let mut pak = cli.open(&cmd.input)?;
    let tree = pak.directory_tree()?;
    for item in tree.walk() {
        let depth = item.path.matches(PATH_SEPARATOR).count();
        let leaf = item.path.rsplit(PATH_SEPARATOR).next().unwrap_or(&item.path);
        let suffix = if item.is_dir { "/" } else { "" };
        println!("{}{leaf}{suffix}", "  ".repeat(depth));
    }
    println!(
        "{} directories, {} files",
        tree.directory_count(),
        tree.file_count()
    );
    Ok(())
}

pub fn delete(cli: &Cli, cmd: &DeleteCommand) -> anyhow::Result<()> {
    let mut pak = cli.open(&cmd.input)?;
    for name in &cmd.names {
        pak.delete(name)
            .with_context(|| format!("Failed to delete `{name}`"))?;
        println!("Deleted: {name}");
    }
    crate::close(pak)
}

pub fn verify(cli: &Cli, cmd: &VerifyCommand) -> anyhow::Result<()> {
    let mut pak = cli.open(&cmd.input)?;
    let total = pak.list()?.len();
    let mismatched = pak.verify()?;
    for name in &mismatched {
        println!("Hash mismatch: {name}");
    }
    if !mismatched.is_empty() {
        anyhow::bail!("{} of {} entries failed verification", mismatched.len(), total);
    }
    println!("All {total} entries verified.");
    Ok(())
}
