use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use openssl::envelope::{Open, Seal};
use openssl::pkey::PKey;
use openssl::symm::Cipher;

use crate::config::StorageConfig;
use crate::constants::{ENCRYPTION_CHUNK_SIZE, SEALED_ARCHIVE_EXTENSION, SEALED_ARCHIVE_MAGIC};
use crate::storage::{SealedArchive, SecureStorage};
use crate::utils::compress::compress_directory;
use crate::utils::hash::calculate_sha256;

/// Upper bound for the wrapped key and IV fields of a sealed file header
const MAX_HEADER_FIELD_LEN: usize = 64 * 1024;

/// Zip the workspace, then encrypt the zip with a fresh AES-256-CBC key
/// wrapped for the examiner's RSA public key.
///
/// Sealed file layout: magic, u32 BE wrapped key length, wrapped key,
/// u32 BE IV length, IV, ciphertext.
#[derive(Debug, Clone)]
pub struct EnvelopeStorage {
    public_key: PathBuf,
    remove_plaintext: bool,
}

impl EnvelopeStorage {
    pub fn new(public_key: impl Into<PathBuf>) -> Self {
        Self {
            public_key: public_key.into(),
            remove_plaintext: false,
        }
    }

    /// Delete the plaintext workspace once the sealed file is written
    pub fn remove_plaintext(mut self, remove: bool) -> Self {
        self.remove_plaintext = remove;
        self
    }

    /// Storage for the configured key, `None` when no key is configured
    pub fn from_config(config: &StorageConfig) -> Option<Self> {
        config
            .public_key
            .as_ref()
            .map(|key| Self::new(key).remove_plaintext(config.remove_plaintext))
    }

    fn seal_zip(&self, zip_path: &Path, sealed_path: &Path) -> Result<()> {
        let pem = fs::read(&self.public_key)
            .with_context(|| format!("Failed to read public key {}", self.public_key.display()))?;
        let key = PKey::public_key_from_pem(&pem)
            .with_context(|| format!("Invalid public key in {}", self.public_key.display()))?;

        let cipher = Cipher::aes_256_cbc();
        let mut seal = Seal::new(cipher, &[key]).context("Failed to initialize envelope")?;
        let wrapped_key = seal
            .encrypted_keys()
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("Envelope produced no wrapped key"))?;
        let iv = seal.iv().map(<[u8]>::to_vec).unwrap_or_default();

        let mut reader = BufReader::new(
            File::open(zip_path).with_context(|| format!("Failed to open {}", zip_path.display()))?,
        );
        let mut writer = BufWriter::new(
            File::create(sealed_path).with_context(|| format!("Failed to create {}", sealed_path.display()))?,
        );

        writer.write_all(SEALED_ARCHIVE_MAGIC)?;
        write_field(&mut writer, &wrapped_key)?;
        write_field(&mut writer, &iv)?;

        let mut input = vec![0u8; ENCRYPTION_CHUNK_SIZE];
        let mut output = vec![0u8; ENCRYPTION_CHUNK_SIZE + cipher.block_size()];

        loop {
            let bytes_read = reader.read(&mut input)?;
            if bytes_read == 0 {
                break;
            }
            let count = seal.update(&input[..bytes_read], &mut output)?;
            writer.write_all(&output[..count])?;
        }

        let count = seal.finalize(&mut output)?;
        writer.write_all(&output[..count])?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        Ok(())
    }
}

impl SecureStorage for EnvelopeStorage {
    fn store(&self, workspace: &Path) -> Result<SealedArchive> {
        let start = Instant::now();

        let name = workspace
            .file_name()
            .ok_or_else(|| anyhow!("Workspace {} has no name", workspace.display()))?
            .to_string_lossy()
            .to_string();
        let parent = workspace.parent().unwrap_or_else(|| Path::new("."));
        let zip_path = parent.join(format!("{}.zip", name));
        let sealed_path = parent.join(format!("{}.zip.{}", name, SEALED_ARCHIVE_EXTENSION));

        if sealed_path.exists() {
            bail!("Sealed archive {} already exists", sealed_path.display());
        }

        info!("Sealing {} with key {}", workspace.display(), self.public_key.display());

        let result = compress_directory(workspace, &zip_path).and_then(|_| self.seal_zip(&zip_path, &sealed_path));

        // The intermediate zip never outlives the attempt
        if zip_path.exists() {
            if let Err(e) = fs::remove_file(&zip_path) {
                warn!("Failed to remove intermediate archive {}: {}", zip_path.display(), e);
            }
        }

        if let Err(e) = result {
            if sealed_path.exists() {
                let _ = fs::remove_file(&sealed_path);
            }
            return Err(e.context(format!("Failed to seal {}", workspace.display())));
        }

        let sha256 = calculate_sha256(&sealed_path)
            .with_context(|| format!("Failed to hash sealed archive {}", sealed_path.display()))?;

        let mut plaintext_retained = true;
        if self.remove_plaintext {
            match fs::remove_dir_all(workspace) {
                Ok(()) => {
                    debug!("Removed plaintext workspace {}", workspace.display());
                    plaintext_retained = false;
                }
                Err(e) => warn!("Sealed, but failed to remove plaintext {}: {}", workspace.display(), e),
            }
        }

        info!("Sealed archive written to {} in {:?}", sealed_path.display(), start.elapsed());

        Ok(SealedArchive {
            path: sealed_path,
            plaintext_retained,
            sha256,
        })
    }
}

fn write_field(writer: &mut impl Write, data: &[u8]) -> Result<()> {
    let len = u32::try_from(data.len()).context("Envelope header field too large")?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(data)?;
    Ok(())
}

fn read_field(reader: &mut impl Read) -> Result<Vec<u8>> {
    let mut len = [0u8; 4];
    reader.read_exact(&mut len)?;
    let len = u32::from_be_bytes(len) as usize;
    if len > MAX_HEADER_FIELD_LEN {
        bail!("Envelope header field of {} bytes is not plausible", len);
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;
    Ok(data)
}

/// Decrypt a sealed archive with the examiner's private key (PEM) into `destination`
pub fn open_sealed_archive(sealed: &Path, private_key_pem: &[u8], destination: &Path) -> Result<()> {
    let key = PKey::private_key_from_pem(private_key_pem).context("Invalid private key")?;

    let mut reader = BufReader::new(File::open(sealed).with_context(|| format!("Failed to open {}", sealed.display()))?);

    let mut magic = vec![0u8; SEALED_ARCHIVE_MAGIC.len()];
    reader.read_exact(&mut magic)?;
    if magic != SEALED_ARCHIVE_MAGIC {
        bail!("{} is not a sealed acquisition archive", sealed.display());
    }

    let wrapped_key = read_field(&mut reader)?;
    let iv = read_field(&mut reader)?;

    let cipher = Cipher::aes_256_cbc();
    let iv = if iv.is_empty() { None } else { Some(iv.as_slice()) };
    let mut open = Open::new(cipher, &key, iv, &wrapped_key).context("Failed to unwrap content key")?;

    let mut writer = BufWriter::new(
        File::create(destination).with_context(|| format!("Failed to create {}", destination.display()))?,
    );
    let mut input = vec![0u8; ENCRYPTION_CHUNK_SIZE];
    let mut output = vec![0u8; ENCRYPTION_CHUNK_SIZE + cipher.block_size()];

    loop {
        let bytes_read = reader.read(&mut input)?;
        if bytes_read == 0 {
            break;
        }
        let count = open.update(&input[..bytes_read], &mut output)?;
        writer.write_all(&output[..count])?;
    }

    let count = open.finalize(&mut output).context("Sealed archive is corrupt or the key does not match")?;
    writer.write_all(&output[..count])?;
    writer.flush()?;

    Ok(())
}
