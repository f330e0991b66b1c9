use std::sync::Arc;

use anyhow::Context;
use linguahub_api::{config::Config, create_router, services::AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let tracer = init_telemetry()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "linguahub_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();

    let env = std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());
    tracing::info!("Starting LinguaHub API ({})", env);

    let config = Config::load().context("Failed to load configuration")?;

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .context("Failed to connect to MongoDB")?;
    tracing::info!("MongoDB connected");

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).context("Failed to create Redis client")?;

    let state = AppState::new(config, mongo_client, redis_client)
        .await
        .context("Failed to initialize application state")?;

    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080")
        .await
        .context("Failed to bind 0.0.0.0:8080")?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_telemetry() -> anyhow::Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use opentelemetry_sdk::Resource;

    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4318".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(otlp_endpoint)
        .build()
        .context("Failed to create OTLP exporter")?;

    let resource = Resource::builder_empty()
        .with_service_name("linguahub-api")
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    let tracer = provider.tracer("linguahub-api");
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracer)
}
