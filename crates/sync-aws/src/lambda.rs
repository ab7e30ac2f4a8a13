//! Invocation runtime backed by Lambda.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use aws_sdk_lambda::Client;
use serde_json::Value;
use tracing::debug;

use sync_worker::{FunctionIdentity, Invoker, WorkerError};

pub struct LambdaInvoker {
    client: Client,
}

impl LambdaInvoker {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self::from_client(Client::new(sdk_config))
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Invoker for LambdaInvoker {
    async fn invoke_async(
        &self,
        function: &FunctionIdentity,
        payload: &Value,
    ) -> Result<(), WorkerError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| WorkerError::Invocation(format!("encode payload: {e}")))?;

        let output = self
            .client
            .invoke()
            .function_name(&function.name)
            .set_qualifier(function.qualifier.clone())
            .invocation_type(InvocationType::Event)
            .payload(Blob::new(body))
            .send()
            .await
            .map_err(|e| {
                WorkerError::Invocation(format!(
                    "invoke {}: {}",
                    function.name,
                    DisplayErrorContext(&e)
                ))
            })?;

        debug!(
            function = %function.name,
            status = output.status_code,
            "Invocation accepted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sdk_config;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const INVOKE_PATH: &str = "/2015-03-31/functions/search-sync-dlq/invocations";

    #[tokio::test]
    async fn test_invoke_is_async_and_pinned_to_version() {
        let server = MockServer::start().await;
        let payload = json!({"source": "aws.events", "detail-type": "Scheduled Event"});

        Mock::given(method("POST"))
            .and(path(INVOKE_PATH))
            .and(query_param("Qualifier", "12"))
            .and(header("x-amz-invocation-type", "Event"))
            .and(body_json(&payload))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let invoker = LambdaInvoker::new(&sdk_config(&server.uri()));
        let identity = FunctionIdentity::new("search-sync-dlq").with_qualifier("12");

        invoker.invoke_async(&identity, &payload).await.unwrap();
    }

    #[tokio::test]
    async fn test_invoke_without_qualifier() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(INVOKE_PATH))
            .and(query_param_is_missing("Qualifier"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let invoker = LambdaInvoker::new(&sdk_config(&server.uri()));
        invoker
            .invoke_async(&FunctionIdentity::new("search-sync-dlq"), &json!({}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invoke_failure_is_invocation_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(INVOKE_PATH))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("x-amzn-errortype", "ResourceNotFoundException")
                    .insert_header("content-type", "application/json")
                    .set_body_json(json!({
                        "Type": "User",
                        "message": "Function not found"
                    })),
            )
            .mount(&server)
            .await;

        let invoker = LambdaInvoker::new(&sdk_config(&server.uri()));
        let err = invoker
            .invoke_async(&FunctionIdentity::new("search-sync-dlq"), &json!({}))
            .await
            .unwrap_err();

        match err {
            WorkerError::Invocation(message) => assert!(message.contains("search-sync-dlq")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
