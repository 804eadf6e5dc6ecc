//! REST implementation of the provider API surface.

use reqwest::{Certificate, Client, Method, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{ConfigError, OciConfig};

use super::api::{ApiError, ApiFuture, ProviderApi};
use super::sign::RequestSigner;
use super::types::{
    AvailabilityDomain, ImagePage, Instance, InstanceAction, LaunchDetails, Vnic, VnicAttachment,
};

/// Core and identity services share this API version.
const API_VERSION: &str = "20160918";
/// Response header carrying the next-page token of a paginated listing.
const NEXT_PAGE_HEADER: &str = "opc-next-page";

/// Signed `reqwest` transport for the compute, network, and identity
/// services.
#[derive(Clone, Debug)]
pub struct RestApi {
    http: Client,
    signer: RequestSigner,
    compute_endpoint: String,
    network_endpoint: String,
    identity_endpoint: String,
}

impl RestApi {
    /// Builds the transport from configuration.
    ///
    /// Standard mode derives the service endpoints from the region; rover
    /// mode uses the configured endpoint overrides and installs the device
    /// certificate as an additional trust root.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when key material, the rover certificate, or
    /// the HTTP client cannot be constructed. TLS failures surface as typed
    /// errors rather than terminating the process.
    pub fn from_config(config: &OciConfig) -> Result<Self, ConfigError> {
        let key_pem = config.private_key_pem()?;
        let signer = RequestSigner::new(
            &config.tenancy_id,
            &config.user_id,
            &config.fingerprint,
            &key_pem,
            config.private_key_passphrase.as_deref(),
        )?;

        let mut builder = Client::builder();
        let (compute_endpoint, network_endpoint) = if config.is_rover() {
            let cert_pem = config.rover_cert_pem()?;
            let certificate = Certificate::from_pem(cert_pem.as_bytes())
                .map_err(|err| ConfigError::InvalidCertificate(err.to_string()))?;
            builder = builder.add_root_certificate(certificate);
            (
                require_endpoint(
                    config.rover_compute_endpoint.as_deref(),
                    "OCI_ROVER_COMPUTE_ENDPOINT",
                )?,
                require_endpoint(
                    config.rover_network_endpoint.as_deref(),
                    "OCI_ROVER_NETWORK_ENDPOINT",
                )?,
            )
        } else {
            let core = format!("https://iaas.{}.oraclecloud.com", config.region);
            (core.clone(), core)
        };
        let identity_endpoint = format!("https://identity.{}.oraclecloud.com", config.region);

        let http = builder
            .build()
            .map_err(|err| ConfigError::Parse(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            signer,
            compute_endpoint,
            network_endpoint,
            identity_endpoint,
        })
    }

    /// Builds a transport against explicit endpoints.
    ///
    /// Used by tests to point the transport at a local server; production
    /// construction goes through [`RestApi::from_config`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when key material cannot be parsed or the
    /// HTTP client cannot be constructed.
    pub fn with_endpoints(
        config: &OciConfig,
        compute_endpoint: impl Into<String>,
        network_endpoint: impl Into<String>,
        identity_endpoint: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let key_pem = config.private_key_pem()?;
        let signer = RequestSigner::new(
            &config.tenancy_id,
            &config.user_id,
            &config.fingerprint,
            &key_pem,
            config.private_key_passphrase.as_deref(),
        )?;
        let http = Client::builder()
            .build()
            .map_err(|err| ConfigError::Parse(format!("failed to build HTTP client: {err}")))?;
        Ok(Self {
            http,
            signer,
            compute_endpoint: trim_endpoint(compute_endpoint.into()),
            network_endpoint: trim_endpoint(network_endpoint.into()),
            identity_endpoint: trim_endpoint(identity_endpoint.into()),
        })
    }

    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        path_and_query: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Response, ApiError> {
        let url = format!("{endpoint}{path_and_query}");
        let host = host_of(endpoint);
        let signed = self.signer.sign(
            &method.as_str().to_lowercase(),
            path_and_query,
            &host,
            body.as_deref(),
        );
        debug!(method = %method, url = %url, "issuing provider request");

        let mut request = self
            .http
            .request(method, &url)
            .header("date", &signed.date)
            .header("authorization", &signed.authorization)
            .header("accept", "application/json");
        if let Some(headers) = &signed.body_headers {
            request = request
                .header("content-type", &headers.content_type)
                .header("x-content-sha256", &headers.content_sha256);
        }
        if let Some(payload) = body {
            request = request.body(payload);
        }

        let response = request.send().await?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        path_and_query: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .execute(Method::GET, endpoint, path_and_query, None)
            .await?;
        decode(response).await
    }
}

impl ProviderApi for RestApi {
    fn launch_instance<'a>(&'a self, details: &'a LaunchDetails) -> ApiFuture<'a, Instance> {
        Box::pin(async move {
            let payload = serde_json::to_vec(details).map_err(|err| ApiError::Decode {
                message: err.to_string(),
            })?;
            let response = self
                .execute(
                    Method::POST,
                    &self.compute_endpoint,
                    &format!("/{API_VERSION}/instances"),
                    Some(payload),
                )
                .await?;
            decode(response).await
        })
    }

    fn get_instance<'a>(&'a self, instance_id: &'a str) -> ApiFuture<'a, Instance> {
        Box::pin(async move {
            self.get_json(
                &self.compute_endpoint,
                &format!("/{API_VERSION}/instances/{instance_id}"),
            )
            .await
        })
    }

    fn instance_action<'a>(
        &'a self,
        instance_id: &'a str,
        action: InstanceAction,
    ) -> ApiFuture<'a, Instance> {
        Box::pin(async move {
            let response = self
                .execute(
                    Method::POST,
                    &self.compute_endpoint,
                    &format!(
                        "/{API_VERSION}/instances/{instance_id}?action={}",
                        action.as_str()
                    ),
                    Some(Vec::new()),
                )
                .await?;
            decode(response).await
        })
    }

    fn terminate_instance<'a>(&'a self, instance_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.execute(
                Method::DELETE,
                &self.compute_endpoint,
                &format!("/{API_VERSION}/instances/{instance_id}"),
                None,
            )
            .await?;
            Ok(())
        })
    }

    fn list_images<'a>(
        &'a self,
        compartment_id: &'a str,
        page: Option<&'a str>,
    ) -> ApiFuture<'a, ImagePage> {
        Box::pin(async move {
            let mut path = format!(
                "/{API_VERSION}/images?compartmentId={compartment_id}\
                 &sortBy=TIMECREATED&sortOrder=DESC&lifecycleState=AVAILABLE"
            );
            if let Some(token) = page {
                path.push_str("&page=");
                path.push_str(token);
            }
            let response = self
                .execute(Method::GET, &self.compute_endpoint, &path, None)
                .await?;
            let next_page = response
                .headers()
                .get(NEXT_PAGE_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            let items = decode(response).await?;
            Ok(ImagePage { items, next_page })
        })
    }

    fn list_availability_domains<'a>(
        &'a self,
        compartment_id: &'a str,
    ) -> ApiFuture<'a, Vec<AvailabilityDomain>> {
        Box::pin(async move {
            self.get_json(
                &self.identity_endpoint,
                &format!("/{API_VERSION}/availabilityDomains?compartmentId={compartment_id}"),
            )
            .await
        })
    }

    fn list_vnic_attachments<'a>(
        &'a self,
        compartment_id: &'a str,
        instance_id: &'a str,
    ) -> ApiFuture<'a, Vec<VnicAttachment>> {
        Box::pin(async move {
            self.get_json(
                &self.compute_endpoint,
                &format!(
                    "/{API_VERSION}/vnicAttachments?compartmentId={compartment_id}\
                     &instanceId={instance_id}"
                ),
            )
            .await
        })
    }

    fn get_vnic<'a>(&'a self, vnic_id: &'a str) -> ApiFuture<'a, Vnic> {
        Box::pin(async move {
            self.get_json(
                &self.network_endpoint,
                &format!("/{API_VERSION}/vnics/{vnic_id}"),
            )
            .await
        })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport {
            message: value.to_string(),
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode {
        message: err.to_string(),
    })
}

fn host_of(endpoint: &str) -> String {
    let without_scheme = endpoint
        .split_once("://")
        .map_or(endpoint, |(_, rest)| rest);
    without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_owned()
}

fn trim_endpoint(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_owned()
}

fn require_endpoint(value: Option<&str>, env_var: &str) -> Result<String, ConfigError> {
    value
        .filter(|endpoint| !endpoint.trim().is_empty())
        .map(|endpoint| trim_endpoint(endpoint.to_owned()))
        .ok_or_else(|| {
            ConfigError::MissingField(format!("missing rover endpoint: set {env_var}"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_of_strips_scheme_and_path() {
        assert_eq!(
            host_of("https://iaas.us-phoenix-1.oraclecloud.com"),
            "iaas.us-phoenix-1.oraclecloud.com"
        );
        assert_eq!(host_of("http://127.0.0.1:8080/base"), "127.0.0.1:8080");
    }

    #[test]
    fn require_endpoint_rejects_blank_values() {
        let error =
            require_endpoint(Some("  "), "OCI_ROVER_COMPUTE_ENDPOINT").expect_err("blank value");
        assert!(
            matches!(&error, ConfigError::MissingField(message) if message.contains("OCI_ROVER_COMPUTE_ENDPOINT")),
            "unexpected error: {error}"
        );
    }

    #[test]
    fn trim_endpoint_drops_trailing_slash() {
        assert_eq!(
            trim_endpoint(String::from("https://rover.local:19060/")),
            "https://rover.local:19060"
        );
    }
}
