use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::archive::Archive;
use crate::error::{PakError, Result};
use crate::pak::Entry;

type EntryFilter = dyn Fn(&Entry) -> bool;

#[derive(Debug, Clone)]
pub enum ExtractEvent {
    Start {
        total: usize,
    },
    FileStart {
        name: String,
        path: PathBuf,
    },
    FileDone {
        name: String,
        path: PathBuf,
        error: Option<String>,
    },
    Finish {
        extracted: usize,
        skipped: usize,
        failed: usize,
    },
    Aborted,
}

#[derive(Debug, Default)]
pub struct ExtractReport {
    pub extracted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// `(entry name, error message)` for every failed entry.
    pub errors: Vec<(String, String)>,
}

/// Writes the active entries of an archive to loose files under an output directory.
pub struct ExtractBuilder<'a, A: Archive + ?Sized> {
    archive: &'a mut A,
    output_dir: PathBuf,
    overwrite: bool,
    continue_on_error: bool,
    filter: Option<Box<EntryFilter>>,
    on_event: Option<Box<dyn FnMut(ExtractEvent) + 'a>>,
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl<'a, A: Archive + ?Sized> ExtractBuilder<'a, A> {
    pub fn new(archive: &'a mut A, output_dir: impl AsRef<Path>) -> Self {
        Self {
            archive,
            output_dir: output_dir.as_ref().to_path_buf(),
            overwrite: false,
            continue_on_error: false,
            filter: None,
            on_event: None,
            cancel_flag: None,
        }
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Entry) -> bool + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn on_event<F>(mut self, on_event: F) -> Self
    where
        F: FnMut(ExtractEvent) + 'a,
    {
        self.on_event = Some(Box::new(on_event));
        self
    }

    pub fn cancel_flag(mut self, cancel_flag: Arc<AtomicBool>) -> Self {
        self.cancel_flag = Some(cancel_flag);
        self
    }

    pub fn run(mut self) -> Result<ExtractReport> {
        if !self.output_dir.exists() {
            std::fs::create_dir_all(&self.output_dir)?;
        }

        let mut report = ExtractReport::default();
        let mut tasks: Vec<String> = Vec::new();
        for entry in self.archive.list()? {
            if let Some(filter) = &self.filter
                && !filter(entry)
            {
                report.skipped += 1;
                continue;
            }
            tasks.push(entry.name().to_string());
        }

        self.emit(ExtractEvent::Start { total: tasks.len() });

        for name in tasks {
            if self.should_abort() {
                tracing::info!(extracted = report.extracted, "extraction cancelled");
                self.emit(ExtractEvent::Aborted);
                return Ok(report);
            }

            let path = self.output_dir.join(&name);
            self.emit(ExtractEvent::FileStart {
                name: name.clone(),
                path: path.clone(),
            });

            let result = self.extract_one(&name);
            let error = result.as_ref().err().map(|e| e.to_string());
            self.emit(ExtractEvent::FileDone {
                name: name.clone(),
                path,
                error: error.clone(),
            });

            match result {
                Ok(()) => report.extracted += 1,
                Err(e) => {
                    tracing::warn!(%name, error = %e, "failed to extract entry");
                    report.failed += 1;
                    report.errors.push((name, error.unwrap_or_default()));
                    if !self.continue_on_error {
                        return Err(e);
                    }
                }
            }
        }

        self.emit(ExtractEvent::Finish {
            extracted: report.extracted,
            skipped: report.skipped,
            failed: report.failed,
        });
        Ok(report)
    }

    fn emit(&mut self, event: ExtractEvent) {
        if let Some(on_event) = &mut self.on_event {
            on_event(event);
        }
    }

    fn should_abort(&self) -> bool {
        if let Some(flag) = &self.cancel_flag {
            return flag.load(Ordering::Relaxed);
        }
        false
    }

    fn extract_one(&mut self, name: &str) -> Result<()> {
        let out_path = output_path(&self.output_dir, name)?;
        if let Some(parent) = out_path.parent()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut open_options = OpenOptions::new();
        if self.overwrite {
            open_options.create(true).write(true).truncate(true);
        } else {
            open_options.create_new(true).write(true);
        }
        let mut file = BufWriter::new(open_options.open(&out_path)?);

        if let Err(e) = self.archive.unpack_to(name, &mut file) {
            drop(file);
            let _ = std::fs::remove_file(&out_path);
            return Err(e);
        }
        file.flush()?;
        Ok(())
    }
}

/// Maps an entry name onto a path below `output_dir`, refusing anything that
/// would escape it.
fn output_path(output_dir: &Path, name: &str) -> Result<PathBuf> {
    let mut path = output_dir.to_path_buf();
    let mut has_leaf = false;
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                has_leaf = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PakError::UnsafePath(name.to_string()));
            }
        }
    }
    if !has_leaf {
        return Err(PakError::UnsafePath(name.to_string()));
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use crate::error::ErrorKind;
    use crate::pakfile::{PakFile, PakFileBuilder};
    use crate::virtual_pak::{ManifestEntry, VirtualPak};

    use super::*;

    fn sample_pak() -> PakFile<Cursor<Vec<u8>>> {
        let mut pak = PakFileBuilder::new().create(Cursor::new(Vec::new())).unwrap();
        pak.pack("a/b/c.dat", b"nested", 0, 0).unwrap();
        pak.pack("a/d.dat", b"shallow", 0, 0).unwrap();
        pak.pack("top.txt", b"top", 0, 0).unwrap();
        pak
    }

    #[test]
    fn test_extract_all() {
        let dir = tempfile::tempdir().unwrap();
        let mut pak = sample_pak();

        let mut events = Vec::new();
        let report = ExtractBuilder::new(&mut pak, dir.path())
            .on_event(|event| events.push(event))
            .run()
            .unwrap();

        assert_eq!(report.extracted, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(std::fs::read(dir.path().join("a/b/c.dat")).unwrap(), b"nested");
        assert_eq!(std::fs::read(dir.path().join("top.txt")).unwrap(), b"top");
        assert!(matches!(events.first(), Some(ExtractEvent::Start { total: 3 })));
        assert!(matches!(events.last(), Some(ExtractEvent::Finish { extracted: 3, .. })));
    }

    #[test]
    fn test_filter_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("top.txt"), b"old").unwrap();
        let mut pak = sample_pak();

        let err = ExtractBuilder::new(&mut pak, dir.path())
            .filter(|entry| entry.name().ends_with(".txt"))
            .run()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);

        let report = ExtractBuilder::new(&mut pak, dir.path())
            .filter(|entry| entry.name().ends_with(".txt"))
            .overwrite(true)
            .run()
            .unwrap();
        assert_eq!((report.extracted, report.skipped), (1, 2));
        assert_eq!(std::fs::read(dir.path().join("top.txt")).unwrap(), b"top");
        assert!(!dir.path().join("a").exists());
    }

    #[test]
    fn test_continue_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut pak = VirtualPak::from_manifest([
            ManifestEntry::in_memory("good.bin", vec![1, 2, 3]),
            ManifestEntry::new("bad.bin", Box::new(vec![4, 5])).with_md5([0xAB; 16]),
            ManifestEntry::in_memory("../escape.bin", vec![6]),
        ])
        .unwrap();

        let report = ExtractBuilder::new(&mut pak, dir.path())
            .continue_on_error(true)
            .run()
            .unwrap();
        assert_eq!(report.extracted, 1);
        assert_eq!(report.failed, 2);
        assert!(report.errors.iter().any(|(name, _)| name == "bad.bin"));
        assert!(!dir.path().join("bad.bin").exists());
        assert!(!dir.path().parent().unwrap().join("escape.bin").exists());
    }

    #[test]
    fn test_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let mut pak = sample_pak();
        let cancel = Arc::new(AtomicBool::new(true));

        let mut aborted = false;
        let report = ExtractBuilder::new(&mut pak, dir.path())
            .cancel_flag(cancel)
            .on_event(|event| aborted |= matches!(event, ExtractEvent::Aborted))
            .run()
            .unwrap();
        assert_eq!(report.extracted, 0);
        assert!(aborted);
    }

    #[test]
    fn test_output_path() {
        let base = Path::new("out");
        assert_eq!(output_path(base, "a/./b.txt").unwrap(), Path::new("out/a/b.txt"));
        assert!(output_path(base, "../x").is_err());
        assert!(output_path(base, "/abs").is_err());
        assert!(output_path(base, "").is_err());
    }
}
