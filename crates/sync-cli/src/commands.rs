//! Command implementations.
//!
//! Every command loads layered settings, applies CLI overrides, starts
//! logging, then wires the AWS collaborators and both index clusters into
//! the worker.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use lambda_runtime::{service_fn, LambdaEvent};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::info;

use sync_aws::{load_sdk_config, LambdaInvoker, S3ObjectStore, SdkConfig, SqsRetryQueue};
use sync_index::{ElasticIndex, IndexWriter, WriterPolicy};
use sync_types::Settings;
use sync_worker::{
    DrainLimits, DrainLoop, DrainOutcome, DrainStop, EventRouter, FunctionHandler,
    FunctionIdentity, ObjectStore, RouteOutcome, TriggerHandler,
};

use crate::cli::FunctionRole;

/// Load configuration and apply CLI overrides.
fn load_settings(config_path: Option<&str>, log_level_override: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    // CLI flags take highest precedence
    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }

    settings.validate().context("Invalid configuration")?;
    Ok(settings)
}

fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Build the dual-index writer from settings.
fn build_writer(settings: &Settings) -> Result<Arc<IndexWriter>> {
    let timeout = Duration::from_secs(settings.request_timeout_secs);
    let current = ElasticIndex::new("current", &settings.current, timeout)
        .context("Failed to create current index client")?;
    let legacy = ElasticIndex::new("legacy", &settings.legacy, timeout)
        .context("Failed to create legacy index client")?;

    info!(
        current = %format!("{}/{}", settings.current.url, settings.current.index),
        legacy = %format!("{}/{}", settings.legacy.url, settings.legacy.index),
        "Index clusters configured"
    );

    Ok(Arc::new(IndexWriter::new(
        Arc::new(current),
        Arc::new(legacy),
        WriterPolicy::from(&settings.writer),
    )))
}

fn build_handler(settings: &Settings, store: Arc<dyn ObjectStore>) -> Result<TriggerHandler> {
    let writer = build_writer(settings)?;
    Ok(TriggerHandler::new(
        EventRouter::new(store, writer),
        settings.trigger.record_mode,
    ))
}

/// Wire the drain loop to SQS and Lambda.
fn build_drain(
    settings: &Settings,
    sdk_config: &SdkConfig,
    handler: Arc<TriggerHandler>,
) -> Result<DrainLoop> {
    let queue_url = queue_url(settings)?;
    Ok(DrainLoop::new(
        Arc::new(SqsRetryQueue::new(sdk_config, queue_url)),
        handler,
        Arc::new(LambdaInvoker::new(sdk_config)),
        Duration::from_secs(u64::from(settings.queue.visibility_timeout_secs)),
    ))
}

fn queue_url(settings: &Settings) -> Result<&str> {
    if settings.queue.url.trim().is_empty() {
        bail!("queue.url must be set to drain the retry queue");
    }
    Ok(&settings.queue.url)
}

/// Read an event document from a file, or stdin when no path is given.
async fn read_event_document(path: Option<&str>) -> Result<Vec<u8>> {
    match path {
        Some(path) => tokio::fs::read(Path::new(path))
            .await
            .with_context(|| format!("Failed to read event document {path}")),
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buf)
                .await
                .context("Failed to read event document from stdin")?;
            Ok(buf)
        }
    }
}

fn parse_payload(payload: Option<&str>) -> Result<Value> {
    match payload {
        Some(raw) => serde_json::from_str(raw).context("Trigger payload is not valid JSON"),
        None => Ok(Value::Object(Default::default())),
    }
}

fn describe(outcome: &RouteOutcome) -> String {
    match outcome {
        RouteOutcome::Indexed(report) => format!(
            "indexed {} v{} (current: {:?}, legacy: {:?})",
            report.id, report.version, report.current, report.legacy
        ),
        RouteOutcome::Deleted(report) => format!(
            "deleted {} (current: {:?}, legacy: {:?})",
            report.id, report.current, report.legacy
        ),
        RouteOutcome::Ignored(kind) => format!("ignored {kind}"),
    }
}

/// Serve invocations from the function runtime until it shuts down.
///
/// The running function's name and version come from each invocation's
/// context, so the drain rechains to exactly the deployed version.
pub async fn run_serve(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    role: FunctionRole,
) -> Result<()> {
    let settings = load_settings(config_path, log_level_override)?;
    init_logging(&settings)?;

    let sdk_config = load_sdk_config(&settings.object_store).await;
    let handler = Arc::new(build_handler(
        &settings,
        Arc::new(S3ObjectStore::new(&sdk_config)),
    )?);

    let function = match role {
        FunctionRole::Trigger => FunctionHandler::Trigger(handler),
        FunctionRole::Drain => {
            FunctionHandler::Drain(Arc::new(build_drain(&settings, &sdk_config, handler)?))
        }
    };

    info!(role = ?role, "Serving function invocations");

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let function = function.clone();
        async move {
            let LambdaEvent { payload, context } = event;
            let identity = FunctionIdentity::from_context(
                context.env_config.function_name.clone(),
                &context.env_config.version,
            );
            function
                .invoke(payload, &identity)
                .await
                .map_err(lambda_runtime::Error::from)
        }
    }))
    .await
    .map_err(|e| anyhow!("Function runtime failed: {e}"))
}

/// Handle one event document.
///
/// Any failure becomes a non-zero exit so the invoking runtime can retry
/// and eventually dead-letter the document.
pub async fn run_trigger(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    file: Option<&str>,
) -> Result<()> {
    let settings = load_settings(config_path, log_level_override)?;
    init_logging(&settings)?;

    let payload = read_event_document(file).await?;

    let sdk_config = load_sdk_config(&settings.object_store).await;
    let store = Arc::new(S3ObjectStore::new(&sdk_config));
    let handler = build_handler(&settings, store)?;

    let outcomes = handler
        .handle_bytes(&payload)
        .await
        .context("Failed to handle event")?;

    for outcome in &outcomes {
        println!("{}", describe(outcome));
    }
    Ok(())
}

/// Run one drain hop, re-invoking this function through Lambda on success.
pub async fn run_drain(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    payload: Option<&str>,
) -> Result<()> {
    let settings = load_settings(config_path, log_level_override)?;
    init_logging(&settings)?;

    let payload = parse_payload(payload)?;
    let identity = FunctionIdentity::from_settings(&settings.function).context(
        "function.name is not set and AWS_LAMBDA_FUNCTION_NAME is not in the environment",
    )?;
    let sdk_config = load_sdk_config(&settings.object_store).await;
    let handler = build_handler(&settings, Arc::new(S3ObjectStore::new(&sdk_config)))?;
    let drain = build_drain(&settings, &sdk_config, Arc::new(handler))?;

    // Hop failures are already logged; the chain simply ends
    match drain.run_hop(&payload, &identity).await {
        DrainOutcome::Empty => println!("retry queue empty"),
        DrainOutcome::Stopped {
            message_id, stage, ..
        } => println!(
            "stopped while {stage} {}",
            message_id.as_deref().unwrap_or("-")
        ),
        DrainOutcome::Rechained { message_id } => println!("processed {message_id}, rechained"),
        DrainOutcome::RechainFailed { message_id, .. } => {
            println!("processed {message_id}, rechain failed")
        }
    }
    Ok(())
}

/// Drain the retry queue in a bounded local loop.
pub async fn run_drain_local(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    max_hops: Option<usize>,
    max_duration_secs: Option<u64>,
) -> Result<()> {
    let mut settings = load_settings(config_path, log_level_override)?;
    if let Some(max_hops) = max_hops {
        settings.drain.max_hops = max_hops;
    }
    if let Some(secs) = max_duration_secs {
        settings.drain.max_duration_secs = secs;
    }
    init_logging(&settings)?;

    let sdk_config = load_sdk_config(&settings.object_store).await;
    let handler = build_handler(&settings, Arc::new(S3ObjectStore::new(&sdk_config)))?;
    let drain = build_drain(&settings, &sdk_config, Arc::new(handler))?;

    let report = drain.drain_bounded(DrainLimits::from(&settings.drain)).await;

    let stop = match &report.stop {
        DrainStop::Empty => "queue empty".to_string(),
        DrainStop::HopLimit => "hop limit reached".to_string(),
        DrainStop::TimeLimit => "time limit reached".to_string(),
        DrainStop::Failed {
            message_id, stage, ..
        } => format!(
            "stopped while {stage} {}",
            message_id.as_deref().unwrap_or("-")
        ),
    };
    println!(
        "{} hops, {} acknowledged, {stop}",
        report.hops,
        report.acknowledged.len()
    );
    Ok(())
}
