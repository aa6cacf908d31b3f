use crate::Config;
use crate::gallery::METADATA_FILE_NAME;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create upload directory: {0}")]
    UploadDirectoryCreationFailed(#[from] std::io::Error),

    #[error("Upload directory is not accessible: {0}")]
    UploadDirectoryInaccessible(String),

    #[error("Admin credentials are still the built-in defaults")]
    DefaultAdminCredentials,
}

impl StartupCheckError {
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StartupCheckError::UploadDirectoryCreationFailed(_)
                | StartupCheckError::UploadDirectoryInaccessible(_)
        )
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let upload_dir = &config.storage.upload_directory;
    if !upload_dir.exists() {
        info!("Upload directory does not exist, creating: {:?}", upload_dir);
        if let Err(e) = tokio::fs::create_dir_all(upload_dir).await {
            error!("Failed to create upload directory: {}", e);
            errors.push(StartupCheckError::UploadDirectoryCreationFailed(e));
        } else {
            info!("Upload directory created successfully");
        }
    } else {
        info!("Upload directory exists: {:?}", upload_dir);
    }

    if upload_dir.exists() {
        match tokio::fs::read_dir(upload_dir).await {
            Ok(_) => info!("Upload directory is accessible"),
            Err(e) => {
                error!("Upload directory is not accessible: {}", e);
                errors.push(StartupCheckError::UploadDirectoryInaccessible(e.to_string()));
            }
        }

        if !upload_dir.join(METADATA_FILE_NAME).exists() {
            info!("No metadata document yet, every image will start private");
        }
    }

    let defaults = Config::default();
    if config.admin.password == defaults.admin.password
        || config.admin.token_secret == defaults.admin.token_secret
    {
        warn!("Admin password or token secret is still the default value");
        errors.push(StartupCheckError::DefaultAdminCredentials);
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
