// Re-export all items from the submodules
mod acquisition_config;
mod step_types;

// Re-export step types
pub use step_types::{
    ApkDownloadPolicy,
    BackupScope,
    StepKind,
};

// Re-export acquisition config
pub use acquisition_config::{
    AcquisitionConfig,
    StorageConfig,
    load_or_create_config,
};
