//! Global constants for the android_collector application.
//!
//! This module centralizes all hardcoded values to improve maintainability
//! and make configuration changes easier.

// Device discovery
/// Fixed delay between device discovery attempts (seconds)
pub const DISCOVERY_RETRY_DELAY_SECS: u64 = 5;

/// Device state reported by adb for a connected and authorized device
pub const ADB_STATE_DEVICE: &str = "device";

/// Device state reported by adb while the USB debugging prompt is pending
pub const ADB_STATE_UNAUTHORIZED: &str = "unauthorized";

/// Device state reported by adb for an unresponsive device
pub const ADB_STATE_OFFLINE: &str = "offline";

/// Default adb executable, resolved through PATH
pub const DEFAULT_ADB_PATH: &str = "adb";

// Workspace layout
/// Integrity manifest written by the finalizer
pub const MANIFEST_FILE_NAME: &str = "hashes.csv";

/// Session record written before hashing
pub const SESSION_RECORD_FILE_NAME: &str = "acquisition.json";

/// Append-only journal of step outcomes
pub const STEP_JOURNAL_FILE_NAME: &str = "steps.log";

/// Operator log file written beside the session workspaces
pub const COMMAND_LOG_FILE_NAME: &str = "android_collector.log";

/// Default output directory name (under the current directory)
pub const DEFAULT_OUTPUT_DIR: &str = "acquisitions";

// Buffer sizes
/// Read buffer size for hashing (1MB)
pub const HASH_BUFFER_SIZE: usize = 1024 * 1024;

/// Chunk size for compression operations (512KB)
pub const COMPRESSION_CHUNK_SIZE: usize = 512 * 1024;

/// Chunk size for envelope encryption (1MB)
pub const ENCRYPTION_CHUNK_SIZE: usize = 1024 * 1024;

/// Large file threshold above which the fastest compression level is used (50MB)
pub const LARGE_FILE_COMPRESSION_THRESHOLD: u64 = 50 * 1024 * 1024;

/// File extensions that are already compressed (use minimal compression)
pub const COMPRESSED_EXTENSIONS: &[&str] = &[
    "zip", "gz", "xz", "bz2", "7z", "rar", "apk", "ab", "jpg", "jpeg", "png", "gif", "mp3",
    "mp4", "avi", "mov", "mpg", "mpeg",
];

// Secure storage
/// Magic header of an envelope-sealed archive
pub const SEALED_ARCHIVE_MAGIC: &[u8] = b"ACQENV1\n";

/// Extension appended to the archive once encrypted
pub const SEALED_ARCHIVE_EXTENSION: &str = "enc";

// Device paths
/// Package providing SMS/MMS storage, backed up in SMS-only mode
pub const SMS_PROVIDER_PACKAGE: &str = "com.android.providers.telephony";

/// Remote log locations pulled by the system logs step
pub const SYSTEM_LOG_PATHS: &[&str] = &[
    "/data/system/uiderrors.txt",
    "/proc/kmsg",
    "/proc/last_kmsg",
    "/sys/fs/pstore/console-ramoops",
    "/data/anr/",
    "/data/log/",
];

/// Remote temporary folder captured by the temp folder step
pub const DEVICE_TMP_FOLDER: &str = "/data/local/tmp/";

/// Path prefixes of packages that ship with the system image
pub const SYSTEM_PACKAGE_PREFIXES: &[&str] = &[
    "/system/", "/system_ext/", "/product/", "/vendor/", "/apex/", "/odm/",
];

/// Settings namespaces dumped by the settings step
pub const SETTINGS_NAMESPACES: &[&str] = &["system", "secure", "global"];

// Process exit codes
/// Exit code for initialization or hashing failures
pub const EXIT_RUN_FAILED: i32 = 1;

/// Exit code when sealing was requested but failed
pub const EXIT_UNSEALED: i32 = 2;
