mod config;
mod metrics;

use std::sync::Arc;

use opentelemetry::global;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use poem::endpoint::PrometheusExporter;
use poem::listener::TcpListener;
use poem::EndpointExt;
use tokio::select;
use tracing::{error, info};

use waypoint_bus::{FredMessageBus, MessageBus};
use waypoint_cache::{DomainCache, FredCacheGateway};
use waypoint_core::{Dispatcher, HealthGate, PlanBuilder, Scheduler, TraversalEngine};
use waypoint_manager_client::ReqwestManagerClient;

use crate::config::{make_config_loader, OrchestratorConfig};

fn main() -> Result<(), std::io::Error> {
    if std::env::args().any(|arg| arg == "--dump-openapi-yaml") {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(dump_openapi_yaml())
    } else if let Some(config) = make_config_loader().load_or_dump_config() {
        waypoint_common::tracing_init::init_tracing_with_default_env_filter(&config.tracing);
        let metrics = metrics::register_all();

        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(metrics.registry.clone())
            .build()
            .expect("failed to build the prometheus metrics exporter");
        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        global::set_meter_provider(provider);

        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?
            .block_on(async_main(config, metrics))
    } else {
        Ok(())
    }
}

async fn dump_openapi_yaml() -> Result<(), std::io::Error> {
    let config = OrchestratorConfig::default();
    let orchestration_api = build_orchestration_api(&config)
        .await
        .map_err(std::io::Error::other)?;
    let service = waypoint_api::make_open_api_service(orchestration_api);
    println!("{}", service.spec_yaml());
    Ok(())
}

async fn build_orchestration_api(
    config: &OrchestratorConfig,
) -> anyhow::Result<waypoint_api::OrchestrationApi> {
    let registry = prometheus::Registry::new();

    let cache_metrics = Arc::new(waypoint_cache::CacheMetrics::register(&registry));
    let cache_gateway = FredCacheGateway::connect(config.cache.clone(), cache_metrics).await?;
    let cache = Arc::new(DomainCache::with_config(Arc::new(cache_gateway), &config.cache));

    let bus: Arc<dyn MessageBus> = Arc::new(FredMessageBus::connect(config.bus.clone()).await?);

    let manager_client_metrics = Arc::new(waypoint_manager_client::ManagerClientMetrics::register(&registry));
    let manager_client = Arc::new(ReqwestManagerClient::new(config.manager_urls.clone(), manager_client_metrics));
    let plan_builder = Arc::new(PlanBuilder::new(manager_client, cache.clone()));
    let health_gate = Arc::new(HealthGate::new(cache.clone(), config.health_gate.clone()));

    let dispatcher_metrics = Arc::new(waypoint_core::DispatcherMetrics::register(&registry));
    let dispatcher = Arc::new(Dispatcher::new(bus, dispatcher_metrics));

    let scheduler_metrics = Arc::new(waypoint_core::SchedulerMetrics::register(&registry));
    let scheduler = Scheduler::new(
        cache.clone(),
        health_gate.clone(),
        dispatcher,
        scheduler_metrics,
        config.scheduler.clone(),
    );

    let api_metrics = Arc::new(waypoint_api::ApiMetrics::register(&registry));
    Ok(waypoint_api::OrchestrationApi::new(
        plan_builder,
        cache,
        health_gate,
        scheduler,
        api_metrics,
    ))
}

async fn async_main(
    config: OrchestratorConfig,
    metrics: metrics::OrchestratorMetrics,
) -> Result<(), std::io::Error> {
    let http_port = config.http_port;
    info!(http_port, environment = %config.environment, "starting waypoint orchestrator");

    let cache_gateway = FredCacheGateway::connect(config.cache.clone(), Arc::new(metrics.cache))
        .await
        .map_err(std::io::Error::other)?;
    let cache = Arc::new(DomainCache::with_config(Arc::new(cache_gateway), &config.cache));

    let bus: Arc<dyn MessageBus> = Arc::new(
        FredMessageBus::connect(config.bus.clone())
            .await
            .map_err(std::io::Error::other)?,
    );

    let manager_client = Arc::new(ReqwestManagerClient::new(
        config.manager_urls.clone(),
        Arc::new(metrics.manager_client),
    ));
    let plan_builder = Arc::new(PlanBuilder::new(manager_client, cache.clone()));
    let health_gate = Arc::new(HealthGate::new(cache.clone(), config.health_gate.clone()));
    let dispatcher = Arc::new(Dispatcher::new(bus.clone(), Arc::new(metrics.dispatcher)));

    let scheduler = Scheduler::new(
        cache.clone(),
        health_gate.clone(),
        dispatcher.clone(),
        Arc::new(metrics.scheduler),
        config.scheduler.clone(),
    );

    let traversal_engine = Arc::new(TraversalEngine::new(
        bus,
        cache.clone(),
        dispatcher,
        Arc::new(metrics.traversal),
    ));

    let orchestration_api = waypoint_api::OrchestrationApi::new(
        plan_builder,
        cache,
        health_gate,
        scheduler,
        Arc::new(metrics.api),
    );

    let app = waypoint_api::combined_routes(orchestration_api)
        .nest("/metrics", PrometheusExporter::new(metrics.registry));

    let http_server = tokio::spawn(async move {
        poem::Server::new(TcpListener::bind(format!("0.0.0.0:{http_port}")))
            .run(app)
            .await
            .expect("HTTP server failed");
    });

    let traversal_task = tokio::spawn(async move {
        if let Err(error) = traversal_engine.run().await {
            error!(error = ?error, "traversal engine consumer loop terminated");
        }
    });

    select! {
        _ = http_server => {},
        _ = traversal_task => {},
    }

    Ok(())
}
