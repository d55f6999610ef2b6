//! Azure Blob Storage over its REST API.

use crate::connection::StorageConnection;
use crate::error::{ProviderError, store_status_error, store_transport_error};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, StatusCode};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use vocalis_abstraction::{ContainerStatus, ObjectMetadata, ObjectStore, StoreError};

const API_VERSION: &str = "2021-08-06";
const META_PREFIX: &str = "x-ms-meta-";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub struct AzureBlobStore {
    http_client: Client,
    connection: StorageConnection,
    container: String,
}

impl AzureBlobStore {
    pub fn new(connection: StorageConnection, container: impl Into<String>) -> Result<Self, ProviderError> {
        let http_client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http_client, connection, container: container.into() })
    }

    pub fn from_connection_string(
        connection_string: &str,
        container: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        Self::new(StorageConnection::parse(connection_string)?, container)
    }

    fn container_url(&self) -> String {
        format!("{}/{}", self.connection.blob_endpoint, self.container)
    }

    fn blob_url(&self, key: &str) -> String {
        let encoded = key.split('/').map(|s| urlencoding::encode(s).into_owned()).collect::<Vec<_>>().join("/");
        format!("{}/{encoded}", self.container_url())
    }

    fn signed(&self, url: &str, query: Option<&str>) -> String {
        match query {
            Some(q) => format!("{url}?{q}&{}", self.connection.sas_token),
            None => format!("{url}?{}", self.connection.sas_token),
        }
    }

    async fn failure(response: Response, operation: &str) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        store_status_error(status, &body, operation)
    }
}

#[async_trait]
impl ObjectStore for AzureBlobStore {
    fn container(&self) -> &str {
        &self.container
    }

    async fn create_container(&self) -> Result<ContainerStatus, StoreError> {
        let operation = "create container";
        let response = self
            .http_client
            .put(self.signed(&self.container_url(), Some("restype=container")))
            .header("x-ms-version", API_VERSION)
            .header("Content-Length", "0")
            .send()
            .await
            .map_err(|e| store_transport_error(&e, operation))?;

        match response.status() {
            StatusCode::CREATED => {
                debug!(container = %self.container, "Created blob container");
                Ok(ContainerStatus::Created)
            }
            StatusCode::CONFLICT => Ok(ContainerStatus::AlreadyExists),
            _ => Err(Self::failure(response, operation).await),
        }
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError> {
        let operation = format!("put {key}");
        let content_type = mime_guess::from_path(Path::new(key)).first_or_octet_stream();

        let mut request = self
            .http_client
            .put(self.signed(&self.blob_url(key), None))
            .header("x-ms-version", API_VERSION)
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", content_type.essence_str());
        for (name, value) in metadata {
            request = request.header(format!("{META_PREFIX}{name}"), value);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| store_transport_error(&e, &operation))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::failure(response, &operation).await)
        }
    }

    async fn object_metadata(&self, key: &str) -> Result<ObjectMetadata, StoreError> {
        let operation = format!("head {key}");
        let response = self
            .http_client
            .head(self.signed(&self.blob_url(key), None))
            .header("x-ms-version", API_VERSION)
            .send()
            .await
            .map_err(|e| store_transport_error(&e, &operation))?;

        if !response.status().is_success() {
            return Err(Self::failure(response, &operation).await);
        }

        Ok(response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let name = name.as_str().strip_prefix(META_PREFIX)?;
                Some((name.to_string(), value.to_str().ok()?.to_string()))
            })
            .collect())
    }

    /// Unsigned URL of the blob; readers need their own access to the container.
    fn object_url(&self, key: &str) -> String {
        self.blob_url(key)
    }
}
