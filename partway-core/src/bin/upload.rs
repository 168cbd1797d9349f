//! Multipart upload binary

use partway_core::notify::{LogNotificationClient, NotificationClient, Notifier, SnsClient};
use partway_core::source::read_source;
use partway_core::storage::S3Client;
use partway_core::{UploadCoordinator, UploadJobConfig};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match UploadJobConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };

    info!(
        "Uploading {} to {}/{} via {}",
        config.file.display(),
        config.s3.bucket,
        config.upload.key,
        config.s3.endpoint
    );

    let data = read_source(&config.file).await?;
    let store = Arc::new(S3Client::new(config.s3.clone())?);

    let notifications: Arc<dyn NotificationClient> = match config.sns.clone() {
        Some(sns) => {
            info!("Notifications go to {}", sns.topic_arn);
            Arc::new(SnsClient::new(sns)?)
        }
        None => Arc::new(LogNotificationClient),
    };

    let coordinator = UploadCoordinator::new(store, Notifier::new(notifications), config.upload);

    match coordinator.run(data).await {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(e) => {
            error!("Upload failed fatally: {}", e);
            Err(e.into())
        }
    }
}
