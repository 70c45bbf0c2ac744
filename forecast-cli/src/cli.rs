use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use forecast_core::{
    Config, FacadeMetrics, ForecastError, ForecastService, ProviderId, provider_for,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "forecast", version, about = "Normalized weather forecasts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "weathergov" or "openweathermap".
        provider: String,
    },

    /// Fetch the normalized forecast for a coordinate pair.
    #[command(allow_negative_numbers = true)]
    Fetch {
        latitude: f64,
        longitude: f64,

        /// Provider short name; falls back to the configured default, then
        /// weathergov.
        #[arg(long)]
        provider: Option<String>,

        /// Extra request parameter as key=value (e.g. --param apikey=...).
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Fetch { latitude, longitude, provider, params } => {
                fetch(latitude, longitude, provider, params).await
            }
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    let api_key = inquire::Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    config.upsert_provider_api_key(id, api_key);
    config.save()?;

    println!("Saved configuration for {id} to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn fetch(
    latitude: f64,
    longitude: f64,
    provider: Option<String>,
    params: Vec<(String, String)>,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let id = match provider {
        Some(name) => ProviderId::try_from(name.as_str())?,
        None => config.default_provider_id().unwrap_or(ProviderId::WeatherGov),
    };

    let mut parameters = config.request_parameters(id);
    for (key, value) in params {
        parameters.insert(key, value);
    }

    let service = ForecastService::new(provider_for(id), Arc::new(FacadeMetrics));
    match service.get_forecast(latitude, longitude, &parameters).await {
        Ok(forecast) => {
            println!("{}", forecast.to_pretty_json()?);
            Ok(())
        }
        Err(err @ ForecastError::MissingParameter(_)) => Err(anyhow::anyhow!(
            "{err}\nHint: run `forecast configure {id}` or pass --param <name>=<value>."
        )),
        Err(err) => Err(err.into()),
    }
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("invalid key=value pair '{s}'"))
}
