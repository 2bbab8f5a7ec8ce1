//! CLI command implementations
//!
//! Startup order for `serve`: configuration, logging, client registry, HTTP
//! server. A failure at any step ends the process before traffic is served.

use std::path::Path;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::http_server::HttpServer;
use crate::observability::init_logging;
use crate::operations::{InstanceOutcome, LookupOperations};
use crate::registry::ClientRegistry;
use crate::service::KvLookupService;

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Parse CLI args and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve { config, port } => serve(config.as_deref(), port),
        Command::CreateInstance {
            config,
            instance,
            cluster,
            zone,
        } => create_instance(config.as_deref(), &instance, cluster.as_deref(), &zone),
    }
}

/// Build the lookup service described by `config`
pub fn build_service(config: &AppConfig) -> CliResult<KvLookupService> {
    let connector = config.connector()?;
    let registry = ClientRegistry::build(
        connector.as_ref(),
        &config.project_id,
        &config.instance_ids,
    )?;
    let operations = LookupOperations::new(
        Arc::new(registry),
        config.column_family.clone(),
        config.column_qualifier.clone(),
    );
    Ok(KvLookupService::new(operations, config.max_count_limit))
}

fn runtime() -> CliResult<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))
}

/// Start the HTTP server
pub fn serve(config_path: Option<&Path>, port: Option<u16>) -> CliResult<()> {
    let mut config = AppConfig::load(config_path)?;
    config.http.override_port(port);
    init_logging(config.log_format);
    tracing::info!(
        project_id = %config.project_id,
        instances = ?config.instance_ids,
        backend = ?config.backend,
        "starting kvlookup"
    );

    let service = build_service(&config)?;
    let server = HttpServer::new(config.http.clone(), service);

    runtime()?.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::serve_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Create an instance with a single cluster unless it already exists
pub fn create_instance(
    config_path: Option<&Path>,
    instance: &str,
    cluster: Option<&str>,
    zone: &str,
) -> CliResult<()> {
    let mut config = AppConfig::resolve(config_path)?;
    if config.instance_ids.is_empty() {
        config.instance_ids.push(instance.to_string());
    }
    config.validate()?;
    init_logging(config.log_format);

    let cluster = cluster
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}-c1", instance));
    let service = build_service(&config)?;

    let outcome = runtime()?.block_on(
        service
            .operations()
            .ensure_instance(instance, &cluster, zone),
    )?;
    match outcome {
        InstanceOutcome::Created => {
            tracing::info!(instance = %instance, cluster = %cluster, zone = %zone, "instance creation requested")
        }
        InstanceOutcome::AlreadyExists => {
            tracing::info!(instance = %instance, "instance already exists")
        }
    }
    Ok(())
}
