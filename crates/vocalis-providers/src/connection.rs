//! Azure Storage connection strings.

use crate::error::ProviderError;
use std::collections::HashMap;

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Where blobs live and how requests are authorised.
#[derive(Clone, PartialEq, Eq)]
pub struct StorageConnection {
    /// Blob service endpoint without a trailing slash.
    pub blob_endpoint: String,
    /// SAS token without the leading `?`.
    pub sas_token: String,
}

impl std::fmt::Debug for StorageConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConnection")
            .field("blob_endpoint", &self.blob_endpoint)
            .field("sas_token", &"<redacted>")
            .finish()
    }
}

impl StorageConnection {
    /// Parses `Key=Value;` pairs.
    ///
    /// The endpoint comes from `BlobEndpoint`, or from `AccountName` with
    /// `DefaultEndpointsProtocol` and `EndpointSuffix`. Only
    /// `SharedAccessSignature` credentials are accepted.
    pub fn parse(connection_string: &str) -> Result<Self, ProviderError> {
        let mut pairs = HashMap::new();
        for part in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                ProviderError::ConnectionString(format!("segment {:?} is not Key=Value", redact(part)))
            })?;
            pairs.insert(key.trim(), value.trim());
        }

        let blob_endpoint = match (pairs.get("BlobEndpoint"), pairs.get("AccountName")) {
            (Some(endpoint), _) => (*endpoint).trim_end_matches('/').to_string(),
            (None, Some(account)) => {
                let protocol = pairs.get("DefaultEndpointsProtocol").copied().unwrap_or("https");
                let suffix = pairs.get("EndpointSuffix").copied().unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                format!("{protocol}://{account}.blob.{suffix}")
            }
            (None, None) => {
                return Err(ProviderError::ConnectionString(
                    "either BlobEndpoint or AccountName is required".to_string(),
                ));
            }
        };

        let sas_token = match (pairs.get("SharedAccessSignature"), pairs.contains_key("AccountKey")) {
            (Some(sas), _) if !sas.is_empty() => sas.trim_start_matches('?').to_string(),
            (_, true) => {
                return Err(ProviderError::UnsupportedAuth(
                    "AccountKey credentials are not supported; use a SharedAccessSignature connection string"
                        .to_string(),
                ));
            }
            _ => {
                return Err(ProviderError::ConnectionString(
                    "SharedAccessSignature is required".to_string(),
                ));
            }
        };

        Ok(Self { blob_endpoint, sas_token })
    }
}

fn redact(segment: &str) -> String {
    segment.chars().take(24).collect()
}
