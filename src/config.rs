use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_MODEL_PATH: &str = "models/stroke_logistic.json";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

/// Server settings, read once from flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "stroke-predictor")]
#[command(about = "Serves stroke risk predictions over HTTP", long_about = None)]
pub struct ServerConfig {
    /// Model artifact to load at startup (.onnx or .json)
    #[arg(long, env = "MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    pub bind_addr: String,

    /// Number of HTTP workers; defaults to the number of CPUs
    #[arg(long, env = "WORKERS")]
    pub workers: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_path_ships_with_the_repo() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_MODEL_PATH);
        assert!(crate::artifact::ModelArtifact::load(&path).is_ok());
    }

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::parse_from([
            "stroke-predictor",
            "--model-path",
            "artifacts/lr.json",
            "--bind-addr",
            "0.0.0.0:9000",
            "--workers",
            "2",
        ]);
        assert_eq!(config.model_path, PathBuf::from("artifacts/lr.json"));
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.workers, Some(2));
    }
}
