use std::{process, sync::Arc};

use serde_json::json;
use storefront_edge::{
    application::error::AppError,
    cache::{
        RegionCache, RegionCacheConfig, RegionSource, RegionState, RoutingPolicy, SystemClock,
        resolve_country,
    },
    config::{self, RegionsArgs, Settings},
    infra::{
        backend::HttpRegionSource,
        error::InfraError,
        http::{self, HttpState, RegionsView, StorefrontProxy},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Regions(args) => run_regions(settings, args).await,
    }
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let cache = Arc::new(build_region_cache(&settings)?);
    let proxy = StorefrontProxy::from_settings(&settings.storefront)?.map(Arc::new);
    if proxy.is_none() {
        warn!(
            target = "storefront_edge::http",
            "storefront upstream is not configured; pass-through requests will answer 503"
        );
    }

    let state = HttpState {
        regions: RegionState {
            cache,
            policy: Arc::new(RoutingPolicy::from(&settings.storefront)),
        },
        proxy,
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "storefront_edge::http",
        addr = %settings.server.addr,
        backend = settings.backend.url.as_ref().map(|url| url.as_str()).unwrap_or("none"),
        "storefront edge listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))
}

async fn run_regions(settings: Settings, args: RegionsArgs) -> Result<(), AppError> {
    let cache = build_region_cache(&settings)?;
    let snapshot = cache
        .refresh(&Uuid::new_v4().to_string())
        .await
        .map_err(|err| AppError::unexpected(format!("failed to fetch regions: {err}")))?;

    let mut output = serde_json::to_value(RegionsView::from(snapshot.as_ref()))
        .map_err(|err| AppError::unexpected(format!("failed to encode regions: {err}")))?;

    if let Some(code) = args.resolve.as_deref() {
        let resolution = resolve_country(
            &snapshot.index,
            Some(code),
            cache.config().default_region.as_deref(),
        );
        let resolution = match resolution {
            Some(resolution) => json!({
                "requested": code,
                "country_code": resolution.country_code,
                "region_id": resolution.region_id(),
            }),
            None => json!({ "requested": code }),
        };
        if let Some(fields) = output.as_object_mut() {
            fields.insert("resolution".to_string(), resolution);
        }
    }

    let rendered = serde_json::to_string_pretty(&output)
        .map_err(|err| AppError::unexpected(format!("failed to encode regions: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn build_region_cache(settings: &Settings) -> Result<RegionCache, AppError> {
    let source = HttpRegionSource::from_settings(&settings.backend)?
        .map(|source| Arc::new(source) as Arc<dyn RegionSource>);

    Ok(RegionCache::new(
        RegionCacheConfig::from(&settings.regions),
        source,
        Arc::new(SystemClock),
    ))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "storefront_edge::http",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    info!(target = "storefront_edge::http", "shutting down");
}
