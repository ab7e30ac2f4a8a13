//! Object store backed by S3.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use tracing::debug;

use sync_types::ObjectLocation;
use sync_worker::{ObjectStore, WorkerError};

pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build a client from the shared SDK config.
    ///
    /// A custom endpoint switches to path-style addressing, which
    /// S3-compatible local servers expect.
    pub fn new(sdk_config: &SdkConfig) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config);
        if sdk_config.endpoint_url().is_some() {
            builder = builder.force_path_style(true);
        }
        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>, WorkerError> {
        let output = self
            .client
            .get_object()
            .bucket(&location.container)
            .key(&location.key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    WorkerError::ObjectNotFound(location.clone())
                } else {
                    WorkerError::ObjectStore(format!(
                        "get {location}: {}",
                        DisplayErrorContext(&e)
                    ))
                }
            })?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| WorkerError::ObjectStore(format!("read {location}: {e}")))?
            .into_bytes();

        debug!(location = %location, size = bytes.len(), "Fetched object");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sdk_config;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NO_SUCH_KEY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><Key>5/GONE</Key><RequestId>R1</RequestId></Error>"#;

    const ACCESS_DENIED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>AccessDenied</Code><Message>Access Denied</Message><RequestId>R2</RequestId></Error>"#;

    #[tokio::test]
    async fn test_get_uses_path_style_with_custom_endpoint() {
        let server = MockServer::start().await;
        let body = br#"{"libraryID":5,"key":"ABCD1234","version":3}"#;

        Mock::given(method("GET"))
            .and(path("/zotero-items/5/ABCD1234"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let store = S3ObjectStore::new(&sdk_config(&server.uri()));
        let bytes = store
            .get(&ObjectLocation::new("zotero-items", "5/ABCD1234"))
            .await
            .unwrap();

        assert_eq!(bytes, body.to_vec());
    }

    #[tokio::test]
    async fn test_no_such_key_is_object_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/zotero-items/5/GONE"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(NO_SUCH_KEY),
            )
            .mount(&server)
            .await;

        let store = S3ObjectStore::new(&sdk_config(&server.uri()));
        let location = ObjectLocation::new("zotero-items", "5/GONE");
        let err = store.get(&location).await.unwrap_err();

        match err {
            WorkerError::ObjectNotFound(missing) => assert_eq!(missing, location),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_other_failures_are_object_store_errors() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("content-type", "application/xml")
                    .set_body_string(ACCESS_DENIED),
            )
            .mount(&server)
            .await;

        let store = S3ObjectStore::new(&sdk_config(&server.uri()));
        let err = store
            .get(&ObjectLocation::new("zotero-items", "5/ABCD1234"))
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::ObjectStore(_)));
    }
}
