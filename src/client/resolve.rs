//! Image and availability-domain resolution.

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::types::ImagePage;
use super::{ClientError, OciClient, ProviderApi};

impl<A: ProviderApi> OciClient<A> {
    /// Resolves a human-readable image name to the provider identifier of
    /// the most recently created Available image whose display name matches
    /// case-insensitively.
    ///
    /// Pages arrive sorted by creation time descending, so the first match
    /// in page order is the most recent one. Each page read carries its own
    /// retry policy; see [`ApiError::is_retryable`](super::ApiError::is_retryable).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] when either input is empty (no
    /// network call is made), [`ClientError::ImageNotFound`] when no page
    /// contains a match, and [`ClientError::Api`] when a page read fails
    /// after exhausting its retries.
    pub async fn resolve_image_id(
        &self,
        compartment_id: &str,
        image_name: &str,
    ) -> Result<String, ClientError> {
        if compartment_id.trim().is_empty() || image_name.trim().is_empty() {
            return Err(ClientError::Validation(String::from(
                "cannot resolve an image without a compartment and image name",
            )));
        }

        debug!(image_name, "resolving image ID");
        let mut page: Option<String> = None;
        loop {
            let listed = self
                .list_images_page(compartment_id, page.as_deref())
                .await?;
            if let Some(image) = listed
                .items
                .iter()
                .find(|image| image.display_name.eq_ignore_ascii_case(image_name))
            {
                info!(image = %image.display_name, image_id = %image.id, "resolved node image");
                return Ok(image.id.clone());
            }
            match listed.next_page {
                Some(next) => page = Some(next),
                None => break,
            }
        }

        Err(ClientError::ImageNotFound {
            name: image_name.to_owned(),
            compartment_id: compartment_id.to_owned(),
        })
    }

    /// Resolves a possibly abbreviated or differently cased availability
    /// domain against the compartment's domain list.
    ///
    /// A domain matches when its name contains the uppercased request as a
    /// substring; when several match, the last one in provider order wins.
    /// When nothing matches the literal request is returned unchanged, with
    /// a warning, so a misconfigured value surfaces at launch rather than
    /// being rewritten here.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] when the domain listing fails.
    pub async fn resolve_availability_domain(
        &self,
        compartment_id: &str,
        requested: &str,
    ) -> Result<String, ClientError> {
        debug!(requested, "resolving availability domain");
        let domains = self.api().list_availability_domains(compartment_id).await?;

        let needle = requested.to_uppercase();
        let mut resolved = None;
        for domain in &domains {
            if domain.name.contains(&needle) {
                resolved = Some(domain.name.clone());
            }
        }

        match resolved {
            Some(name) => {
                debug!(availability_domain = %name, "availability domain resolved");
                Ok(name)
            }
            None => {
                warn!(
                    requested,
                    "availability domain did not resolve; using the literal value"
                );
                Ok(requested.to_owned())
            }
        }
    }

    /// Reads one image page, retrying transport and non-2xx failures with a
    /// constant backoff. Decode failures are surfaced immediately.
    async fn list_images_page(
        &self,
        compartment_id: &str,
        page: Option<&str>,
    ) -> Result<ImagePage, ClientError> {
        let mut attempt: u32 = 1;
        loop {
            match self.api().list_images(compartment_id, page).await {
                Ok(listed) => return Ok(listed),
                Err(err) if err.is_retryable() && attempt < self.page_retry_attempts => {
                    warn!(attempt, error = %err, "image listing failed; retrying");
                    sleep(self.page_retry_backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
