use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use log::debug;
use zip::CompressionMethod;
use zip::read::ZipArchive;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::templates::{HTML_ENTRY, README_ENTRY, RenderedBundle};

const SCRIPT_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

/// One named text file inside an archive.
#[derive(Clone, Debug)]
pub struct ArchiveEntry<'a> {
    pub name: &'a str,
    pub contents: &'a str,
    pub executable: bool,
}

impl RenderedBundle {
    /// Entries in the order they are written: launcher, wrapper, readme.
    pub fn entries(&self) -> [ArchiveEntry<'_>; 3] {
        [
            ArchiveEntry {
                name: self.launcher_name,
                contents: &self.launcher,
                executable: true,
            },
            ArchiveEntry {
                name: HTML_ENTRY,
                contents: &self.html,
                executable: false,
            },
            ArchiveEntry {
                name: README_ENTRY,
                contents: &self.readme,
                executable: false,
            },
        ]
    }
}

/// Write `entries` into a fresh ZIP at `dest`, replacing whatever was there.
///
/// Returns the size of the finished file. A failure part-way leaves the
/// truncated file behind.
pub fn write_archive(dest: &Path, entries: &[ArchiveEntry<'_>]) -> Result<u64, String> {
    let file = fs::File::create(dest)
        .map_err(|e| format!("failed to create archive {}: {e}", dest.display()))?;
    let mut zip = ZipWriter::new(file);
    for entry in entries {
        let mode = if entry.executable { SCRIPT_MODE } else { FILE_MODE };
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(mode);
        zip.start_file(entry.name, options)
            .map_err(|e| format!("failed to start entry {}: {e}", entry.name))?;
        zip.write_all(entry.contents.as_bytes())
            .map_err(|e| format!("failed to write entry {}: {e}", entry.name))?;
    }

    let file = zip
        .finish()
        .map_err(|e| format!("failed to finish archive {}: {e}", dest.display()))?;
    let size = file
        .metadata()
        .map_err(|e| format!("failed to stat archive {}: {e}", dest.display()))?
        .len();
    debug!(
        "packager: wrote {} entries to {} ({} bytes)",
        entries.len(),
        dest.display(),
        size
    );
    Ok(size)
}

fn open_archive(path: &Path) -> Result<ZipArchive<fs::File>, String> {
    let file = fs::File::open(path).map_err(|e| format!("zip open error: {e}"))?;
    ZipArchive::new(file).map_err(|e| format!("zip parse error: {e}"))
}

/// Names of the entries stored in the archive at `path`, in archive order.
pub fn list_entries(path: &Path) -> Result<Vec<String>, String> {
    let mut archive = open_archive(path)?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| format!("zip entry error: {e}"))?;
        names.push(entry.name().to_owned());
    }
    Ok(names)
}

pub fn read_entry(path: &Path, name: &str) -> Result<String, String> {
    let mut archive = open_archive(path)?;
    let mut entry = archive
        .by_name(name)
        .map_err(|e| format!("zip entry {name} missing: {e}"))?;
    let mut contents = String::new();
    entry
        .read_to_string(&mut contents)
        .map_err(|e| format!("zip read error for {name}: {e}"))?;
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_readable_archive() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("demo-windows.exe");
        let entries = [
            ArchiveEntry {
                name: "launcher.bat",
                contents: "@echo off",
                executable: true,
            },
            ArchiveEntry {
                name: "README.txt",
                contents: "hello",
                executable: false,
            },
        ];

        let size = write_archive(&dest, &entries).unwrap();
        assert_eq!(size, fs::metadata(&dest).unwrap().len());
        assert_eq!(list_entries(&dest).unwrap(), vec!["launcher.bat", "README.txt"]);
        assert_eq!(read_entry(&dest, "README.txt").unwrap(), "hello");
        assert!(read_entry(&dest, "app.html").is_err());
    }

    #[test]
    fn launcher_keeps_executable_mode() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("demo-linux.AppImage");
        let entries = [
            ArchiveEntry {
                name: "launcher.sh",
                contents: "#!/bin/bash",
                executable: true,
            },
            ArchiveEntry {
                name: "app.html",
                contents: "<html></html>",
                executable: false,
            },
        ];
        write_archive(&dest, &entries).unwrap();

        let mut archive = open_archive(&dest).unwrap();
        let script_mode = archive.by_name("launcher.sh").unwrap().unix_mode().unwrap();
        assert_eq!(script_mode & 0o777, 0o755);
        let html_mode = archive.by_name("app.html").unwrap().unix_mode().unwrap();
        assert_eq!(html_mode & 0o777, 0o644);
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("demo-mac.dmg");
        fs::write(&dest, b"not a zip at all").unwrap();
        let entries = [ArchiveEntry {
            name: "README.txt",
            contents: "fresh",
            executable: false,
        }];
        write_archive(&dest, &entries).unwrap();
        assert_eq!(list_entries(&dest).unwrap(), vec!["README.txt"]);
    }

    #[test]
    fn rejects_non_zip_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.exe");
        fs::write(&path, b"MZ....").unwrap();
        assert!(list_entries(&path).unwrap_err().contains("zip parse error"));
        assert!(list_entries(&dir.path().join("absent.exe")).is_err());
    }

    #[test]
    fn fails_when_destination_dir_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing").join("demo-windows.exe");
        let err = write_archive(&dest, &[]).unwrap_err();
        assert!(err.contains("failed to create archive"));
    }
}
