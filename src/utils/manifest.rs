//! Integrity manifest of a session workspace.
//!
//! The manifest is a point-in-time snapshot: the file list is taken once,
//! then every listed file is hashed. It is written as `hashes.csv` at the
//! workspace root with one `sha256,size,path` record per file, sorted by
//! path, and never lists itself. Fields are quoted when needed so a file
//! name can never split into extra records.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::constants::MANIFEST_FILE_NAME;
use crate::utils::hash::{calculate_sha256, sha256_bytes};

const MANIFEST_HEADER: [&str; 3] = ["sha256", "size", "path"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub sha256: String,
    pub size: u64,
    /// Workspace-relative path with `/` separators. `%` and bytes that are
    /// not valid UTF-8 are written as `%XX`.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
    /// Where the manifest was written
    pub path: PathBuf,
    /// SHA-256 of the manifest file, identifying the whole bundle
    pub sha256: String,
}

impl Manifest {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, relative: &str) -> bool {
        self.entries.iter().any(|e| e.path == relative)
    }

    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }

    pub fn digest(&self) -> &str {
        &self.sha256
    }
}

/// Computes and writes workspace manifests
pub struct Finalizer;

impl Finalizer {
    /// Hash every file currently in the workspace and write the manifest.
    /// Any I/O error aborts: a partial manifest is never written.
    pub fn hash_files(workspace: &Path) -> Result<Manifest> {
        let start = Instant::now();
        info!("Generating file hashes for {}", workspace.display());

        let entries = Self::compute_entries(workspace)?;
        let manifest_path = workspace.join(MANIFEST_FILE_NAME);
        let rendered = render_csv(&entries)?;

        fs::write(&manifest_path, &rendered)
            .with_context(|| format!("Failed to write manifest {}", manifest_path.display()))?;

        info!(
            "Hashed {} file(s) in {:?}, manifest at {}",
            entries.len(),
            start.elapsed(),
            manifest_path.display()
        );

        Ok(Manifest {
            entries,
            path: manifest_path,
            sha256: sha256_bytes(&rendered),
        })
    }

    /// Hash the workspace without writing anything
    pub fn compute_entries(workspace: &Path) -> Result<Vec<ManifestEntry>> {
        let files = snapshot_files(workspace)?;
        debug!("Snapshot of {} file(s) taken for hashing", files.len());

        let mut entries = files
            .par_iter()
            .map(|(relative, absolute)| {
                let size = fs::metadata(absolute)
                    .with_context(|| format!("Failed to read metadata of {}", absolute.display()))?
                    .len();
                let sha256 = calculate_sha256(absolute)
                    .with_context(|| format!("Failed to hash {}", absolute.display()))?;

                Ok(ManifestEntry {
                    sha256,
                    size,
                    path: relative.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Load a manifest previously written into a workspace
    pub fn load(workspace: &Path) -> Result<Manifest> {
        let manifest_path = workspace.join(MANIFEST_FILE_NAME);
        let content = fs::read(&manifest_path)
            .with_context(|| format!("Failed to read manifest {}", manifest_path.display()))?;

        Ok(Manifest {
            entries: parse_csv(&content)?,
            path: manifest_path,
            sha256: sha256_bytes(&content),
        })
    }

    /// Re-hash a workspace and list every difference with its manifest
    pub fn verify(workspace: &Path) -> Result<Vec<String>> {
        let recorded = Self::load(workspace)?;
        let current = Self::compute_entries(workspace)?;
        let mut problems = Vec::new();

        for entry in &recorded.entries {
            match current.iter().find(|c| c.path == entry.path) {
                None => problems.push(format!("missing: {}", entry.path)),
                Some(c) if c.sha256 != entry.sha256 || c.size != entry.size => {
                    problems.push(format!("modified: {}", entry.path))
                }
                Some(_) => {}
            }
        }

        for entry in current.iter().filter(|c| !recorded.contains(&c.path)) {
            problems.push(format!("unlisted: {}", entry.path));
        }

        Ok(problems)
    }
}

/// List every regular file under the workspace except the manifest itself
fn snapshot_files(workspace: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !workspace.is_dir() {
        bail!("Workspace {} does not exist", workspace.display());
    }

    let manifest_path = workspace.join(MANIFEST_FILE_NAME);
    let mut files = Vec::new();

    for entry in WalkDir::new(workspace).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", workspace.display()))?;

        if !entry.file_type().is_file() || entry.path() == manifest_path {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(workspace)
            .map_err(|_| anyhow!("{} is outside the workspace", entry.path().display()))?;

        files.push((manifest_path_of(relative), entry.path().to_path_buf()));
    }

    Ok(files)
}

/// Manifest form of a workspace-relative path. Distinct file names always
/// give distinct strings.
fn manifest_path_of(relative: &Path) -> String {
    #[cfg(unix)]
    let bytes = {
        use std::os::unix::ffi::OsStrExt;
        relative.as_os_str().as_bytes().to_vec()
    };
    #[cfg(not(unix))]
    let bytes = relative.to_string_lossy().replace('\\', "/").into_bytes();

    escape_path_bytes(&bytes)
}

fn escape_path_bytes(mut bytes: &[u8]) -> String {
    let mut escaped = String::with_capacity(bytes.len());

    loop {
        match std::str::from_utf8(bytes) {
            Ok(valid) => {
                push_escaped(&mut escaped, valid);
                return escaped;
            }
            Err(e) => {
                let (valid, rest) = bytes.split_at(e.valid_up_to());
                push_escaped(&mut escaped, std::str::from_utf8(valid).unwrap_or_default());

                let invalid = e.error_len().unwrap_or(rest.len());
                for byte in &rest[..invalid] {
                    escaped.push_str(&format!("%{:02X}", byte));
                }
                bytes = &rest[invalid..];
            }
        }
    }
}

fn push_escaped(out: &mut String, valid: &str) {
    for c in valid.chars() {
        match c {
            '%' => out.push_str("%25"),
            c => out.push(c),
        }
    }
}

fn render_csv(entries: &[ManifestEntry]) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(MANIFEST_HEADER)?;
    for entry in entries {
        writer.serialize(entry)?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to render manifest: {}", e.error()))
}

fn parse_csv(content: &[u8]) -> Result<Vec<ManifestEntry>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(content);

    let header = reader.headers().context("Failed to read manifest header")?;
    if header.iter().ne(MANIFEST_HEADER.iter().copied()) {
        bail!("Manifest header is missing or unexpected");
    }

    reader
        .deserialize::<ManifestEntry>()
        .map(|record| record.context("Malformed manifest record"))
        .collect()
}
