use std::fs;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam::channel::{bounded, Receiver, Sender};
use log::{debug, info};
use zip::{write::FileOptions, ZipWriter};

use crate::constants::{
    COMPRESSED_EXTENSIONS, COMPRESSION_CHUNK_SIZE as CHUNK_SIZE, LARGE_FILE_COMPRESSION_THRESHOLD,
};

/// File entry with its compression options
struct FileEntry {
    rel_path: String,
    abs_path: PathBuf,
    options: FileOptions,
}

type SharedZip = Arc<Mutex<ZipWriter<fs::File>>>;

/// Pick a compression level for a file.
///
/// APKs, backups and media are already compressed and very large files are
/// not worth the CPU time, so both get the fastest level.
pub fn get_compression_options(path: &Path) -> FileOptions {
    let low_compression = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => COMPRESSED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    };

    let large_file = matches!(
        fs::metadata(path),
        Ok(metadata) if metadata.len() > LARGE_FILE_COMPRESSION_THRESHOLD
    );

    let level = if low_compression || large_file { 1 } else { 6 };

    FileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .compression_level(Some(level))
        .unix_permissions(0o644)
        .large_file(large_file)
}

/// Worker loop: stream each queued file into the shared archive
fn compression_worker(receiver: Receiver<Option<FileEntry>>, zip: SharedZip) -> Result<()> {
    let mut buffer = vec![0u8; CHUNK_SIZE];

    while let Ok(Some(entry)) = receiver.recv() {
        let start = Instant::now();

        let file = fs::File::open(&entry.abs_path)
            .with_context(|| format!("Failed to open {}", entry.abs_path.display()))?;
        let file_size = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        // Entries must be written one at a time, hold the lock for the whole file
        {
            let mut zip = zip.lock().map_err(|_| anyhow!("Archive writer lock poisoned"))?;

            zip.start_file(entry.rel_path.clone(), entry.options)
                .with_context(|| format!("Failed to start file entry for {}", entry.rel_path))?;

            loop {
                let bytes_read = reader
                    .read(&mut buffer)
                    .with_context(|| format!("Failed to read from {}", entry.abs_path.display()))?;

                if bytes_read == 0 {
                    break;
                }

                zip.write_all(&buffer[..bytes_read])
                    .with_context(|| format!("Failed to write to zip for {}", entry.rel_path))?;
            }
        }

        debug!("Compressed {} ({} bytes) in {:?}", entry.rel_path, file_size, start.elapsed());
    }

    Ok(())
}

/// Compress a directory into `zip_path` with a pool of worker threads.
///
/// Entry names are relative to `source_dir` with `/` separators. The archive
/// is left behind on error; callers own its cleanup.
pub fn compress_directory(source_dir: &Path, zip_path: &Path) -> Result<PathBuf> {
    let start = Instant::now();
    info!("Compressing {} into {}", source_dir.display(), zip_path.display());

    if !source_dir.is_dir() {
        bail!("{} is not a directory", source_dir.display());
    }

    let zip_file = fs::File::create(zip_path)
        .with_context(|| format!("Failed to create zip file {}", zip_path.display()))?;
    let zip: SharedZip = Arc::new(Mutex::new(ZipWriter::new(zip_file)));

    let (sender, receiver) = bounded::<Option<FileEntry>>(1000);
    let thread_count = std::cmp::min(num_cpus::get(), 8);

    let mut workers = Vec::with_capacity(thread_count);
    for i in 0..thread_count {
        let worker_receiver = receiver.clone();
        let worker_zip = Arc::clone(&zip);

        let handle = thread::Builder::new()
            .name(format!("compression-{}", i))
            .spawn(move || compression_worker(worker_receiver, worker_zip))
            .context("Failed to spawn compression worker")?;
        workers.push(handle);
    }

    let mut dirs = Vec::new();
    let scanned = scan_directory(source_dir, source_dir, &mut dirs, &sender);

    // Always release the workers, even when the scan failed
    for _ in 0..thread_count {
        let _ = sender.send(None);
    }

    let mut worker_error = None;
    for worker in workers {
        match worker.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                worker_error.get_or_insert(e);
            }
            Err(_) => {
                worker_error.get_or_insert(anyhow!("Compression worker panicked"));
            }
        }
    }

    scanned?;
    if let Some(e) = worker_error {
        return Err(e);
    }

    let mut zip = Arc::try_unwrap(zip)
        .map_err(|_| anyhow!("Archive writer still shared after workers finished"))?
        .into_inner()
        .map_err(|_| anyhow!("Archive writer lock poisoned"))?;

    for dir in dirs {
        zip.add_directory(dir, FileOptions::default())?;
    }

    zip.finish().context("Failed to finalize zip file")?;

    info!("Compressed {} in {:?}", zip_path.display(), start.elapsed());
    Ok(zip_path.to_path_buf())
}

/// Walk a directory and queue its files for compression
fn scan_directory(
    base_path: &Path,
    dir_path: &Path,
    dirs: &mut Vec<String>,
    sender: &Sender<Option<FileEntry>>,
) -> Result<()> {
    let entries = fs::read_dir(dir_path).with_context(|| format!("Failed to read {}", dir_path.display()))?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        let rel_path = path
            .strip_prefix(base_path)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        if file_type.is_dir() {
            dirs.push(format!("{}/", rel_path));
            scan_directory(base_path, &path, dirs, sender)?;
        } else if file_type.is_file() {
            let options = get_compression_options(&path);
            sender
                .send(Some(FileEntry {
                    rel_path,
                    abs_path: path,
                    options,
                }))
                .map_err(|_| anyhow!("Compression workers stopped early"))?;
        } else {
            debug!("Skipping non-regular file {}", path.display());
        }
    }

    Ok(())
}
