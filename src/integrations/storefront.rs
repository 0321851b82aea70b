/*!
 * Rating authority client.
 *
 * One JSON POST per rating body the app is rated by. Disabled by default;
 * when disabled, pushes are logged and dropped.
 */

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use std::time::Duration;

use super::{StorefrontSync, StorefrontUpdate};
use crate::app_config::StorefrontConfig;
use crate::database::models::{AppRecord, ContentRatingRecord, VersionRecord};

/// reqwest-backed storefront client
#[derive(Debug, Clone)]
pub struct HttpStorefrontSync {
    client: Client,
    endpoint: String,
    enabled: bool,
}

impl HttpStorefrontSync {
    pub fn new(config: &StorefrontConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build storefront HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            enabled: config.enabled,
        })
    }
}

#[async_trait]
impl StorefrontSync for HttpStorefrontSync {
    async fn push(&self, update: &StorefrontUpdate) -> Result<()> {
        if !self.enabled {
            debug!(
                "Storefront sync disabled, not pushing {} rating for '{}'",
                update.rating_system, update.title
            );
            return Ok(());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(update)
            .send()
            .await
            .with_context(|| format!("Failed to reach storefront endpoint {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Storefront responded with HTTP {}: {}", status.as_u16(), body));
        }

        info!("Pushed {} rating of '{}' to the storefront", update.rating_system, update.title);
        Ok(())
    }
}

/// Build the updates for an app, one per rating body.
/// Apps without rating authority credentials produce none.
pub fn updates_for(
    app: &AppRecord,
    version: Option<&VersionRecord>,
    ratings: &[ContentRatingRecord],
) -> Vec<StorefrontUpdate> {
    let (Some(submission_id), Some(security_code)) =
        (app.iarc_submission_id.as_deref(), app.iarc_security_code.as_deref())
    else {
        return Vec::new();
    };

    let company = version
        .map(|v| v.developer_name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(&app.author);
    let released = version
        .and_then(|v| v.nominated_at.as_deref())
        .unwrap_or(&app.created_at);
    let release_date = released.get(..10).unwrap_or(released).to_string();

    ratings
        .iter()
        .map(|rating| StorefrontUpdate {
            submission_id: submission_id.to_string(),
            security_code: security_code.to_string(),
            title: app.name.clone(),
            company: company.to_string(),
            release_date: release_date.clone(),
            rating_system: rating.rating_body.clone(),
            rating: rating.rating.clone(),
            descriptors: rating.descriptors.join(", "),
            interactive_elements: app.interactive_elements.join(", "),
        })
        .collect()
}
