use std::{net::SocketAddr, sync::Arc};

use device_notes::{
    ai::{
        gemini::{GeminiBackend, GeminiConfig},
        Generator,
    },
    api_router,
    app::{self, AppParams},
    config, init_db,
    tracing::{add_tracing_layer, setup_tracing},
    uploads::Uploads,
    Result,
};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config();

    setup_tracing(config.log_json, config.tokio_console);

    let db = init_db().await?;

    let uploads = Uploads::new(&config.upload_dir).with_max_bytes(config.upload_max_bytes);
    uploads.initialize().await?;

    let generator: Generator = Arc::new(GeminiBackend::new(GeminiConfig::from(config))?);

    let (app, _api) = app::create(AppParams {
        db,
        uploads,
        generator,
        router: api_router,
    })
    .await?;

    let app = add_tracing_layer(app);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;

    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
