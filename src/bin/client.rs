use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::debug;

use stroke_predictor::client::{
    parse_threshold, ApiClient, ClientError, PatientForm, PredictionView, DEFAULT_API_URL,
};

#[derive(Parser)]
#[command(name = "stroke-client")]
#[command(about = "Submits patient details to the stroke risk service", long_about = None)]
struct Cli {
    /// Base URL of the prediction service
    #[arg(long, env = "API_URL", default_value = DEFAULT_API_URL, global = true)]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the backend health report
    Health {
        #[arg(long, default_value_t = 5)]
        timeout_secs: u64,
    },
    /// Request a stroke risk prediction
    Predict {
        #[command(flatten)]
        form: PatientForm,

        /// Threshold for the local class decision (display only)
        #[arg(long, default_value_t = 0.5, value_parser = parse_threshold)]
        threshold: f64,

        #[arg(long, default_value_t = 15)]
        timeout_secs: u64,
    },
}

fn run(cli: Cli) -> Result<(), ClientError> {
    let client = ApiClient::new(&cli.api_url)?;

    match cli.command {
        Commands::Health { timeout_secs } => {
            debug!("GET {}", client.health_url());
            let report = client.health(Duration::from_secs(timeout_secs))?;
            println!("Backend OK");
            println!(
                "{}",
                serde_json::to_string_pretty(&report).unwrap_or_else(|_| report.to_string())
            );
        }
        Commands::Predict {
            form,
            threshold,
            timeout_secs,
        } => {
            let record = form.to_record();
            println!("POST {}", client.predict_url());
            let result = client.predict(&record, Duration::from_secs(timeout_secs))?;
            println!("Prediction is ready");
            println!("{}", PredictionView { result, threshold }.render());
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
