use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use log::info;

use stroke_predictor::artifact::ModelArtifact;
use stroke_predictor::config::ServerConfig;
use stroke_predictor::handlers;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();

    // No model, no server.
    let artifact = ModelArtifact::load(&config.model_path).with_context(|| {
        format!(
            "model could not be loaded from {}",
            config.model_path.display()
        )
    })?;
    let artifact = web::Data::new(artifact);

    info!("Server running at http://{}", config.bind_addr);

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(handlers::cors())
            .app_data(artifact.clone())
            .configure(handlers::configure)
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server
        .bind(&config.bind_addr)
        .with_context(|| format!("failed to bind {}", config.bind_addr))?
        .run()
        .await?;

    Ok(())
}
