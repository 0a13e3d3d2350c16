use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::{Confirm, CustomType, Password, Select};
use skysnapper_core::{
    CitySearchSession, Config, Coordinate, LocationAuthorization, LocationProvider, SessionState,
    WeatherApi, WeatherClient, WeatherSession, WeatherSnapshot,
};
use std::sync::Arc;

use crate::{platform::TerminalPlatform, render};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skysnapper", version, about = "Current weather for your location or any city")]
pub struct Cli {
    /// Print debug logs to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and an optional fixed device location.
    Configure,

    /// Show current weather for a city, or for your location if none is given.
    Show {
        /// City name, e.g. "Paris" or "Portland,US".
        city: Option<String>,
    },

    /// Look up cities matching a name.
    Search {
        query: String,

        /// Choose one of the matches and show its weather.
        #[arg(long)]
        pick: bool,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city } => show(city).await,
            Command::Search { query, pick } => search(&query, pick).await,
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .with_help_message("Create one at https://home.openweathermap.org/api_keys")
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(api_key.trim().to_string());

    let fixed = Confirm::new("Set a fixed device location for `skysnapper show`?")
        .with_default(config.location.is_some())
        .prompt()?;
    config.location = if fixed {
        let latitude = CustomType::<f64>::new("Latitude:")
            .with_error_message("Please enter a number, e.g. 48.8566")
            .prompt()?;
        let longitude = CustomType::<f64>::new("Longitude:")
            .with_error_message("Please enter a number, e.g. 2.3522")
            .prompt()?;
        Some(Coordinate::new(latitude, longitude))
    } else {
        None
    };

    if let Some(saved) = config.location_permission {
        let forget = Confirm::new(&format!(
            "Location permission is saved as \"{saved}\". Forget it and ask again next time?"
        ))
        .with_default(false)
        .prompt()?;
        if forget {
            forget_permission(&mut config);
        }
    }

    config.save()?;
    println!("Configuration saved to {}", Config::config_file_path()?.display());
    Ok(())
}

fn weather_api(config: &Config) -> Result<Arc<dyn WeatherApi>> {
    let client = WeatherClient::new(config.client_config()?)?;
    Ok(Arc::new(client))
}

async fn show(city: Option<String>) -> Result<()> {
    let mut config = Config::load()?;
    let api = weather_api(&config)?;

    let location = LocationProvider::new(Arc::new(TerminalPlatform::from_config(&config)));
    let initial = location.authorization();
    let session = WeatherSession::new(api, location.clone());

    match city.as_deref() {
        Some(name) => {
            let load = session.load_for_city(name);
            eprintln!("Fetching weather for {name}...");
            load.await;
        }
        None => {
            let load = session.load_for_current_location();
            eprintln!("Fetching weather for your location...");
            load.await;
            remember_permission(&mut config, initial, location.authorization())?;
        }
    }

    present(session.state())
}

async fn search(query: &str, pick: bool) -> Result<()> {
    let config = Config::load()?;
    let api = weather_api(&config)?;

    let search = CitySearchSession::new(Arc::clone(&api));
    search.on_query_changed(query).await;
    if let SessionState::Failed(err) = search.state() {
        return Err(err.into());
    }

    let matches = search.results();
    if matches.is_empty() {
        println!("No cities found for \"{query}\".");
        return Ok(());
    }

    if !pick {
        println!("{}", render::render_matches(&matches));
        return Ok(());
    }

    let options: Vec<String> = matches.iter().map(|m| m.display_name()).collect();
    let choice = Select::new("Pick a city:", options).raw_prompt()?;
    let coordinate = matches[choice.index].coordinate;

    let location = LocationProvider::new(Arc::new(TerminalPlatform::from_config(&config)));
    let session = WeatherSession::new(api, location);
    session.load_for_coordinate(coordinate).await;

    present(session.state())
}

fn present(state: SessionState<WeatherSnapshot>) -> Result<()> {
    match state {
        SessionState::Loaded(snapshot) => {
            println!("{}", render::render_snapshot(&snapshot));
            Ok(())
        }
        SessionState::Failed(err) => Err(err.into()),
        SessionState::Idle | SessionState::Loading => Ok(()),
    }
}

/// Persist a permission decision made during this run.
fn remember_permission(
    config: &mut Config,
    before: LocationAuthorization,
    after: LocationAuthorization,
) -> Result<()> {
    if before == after || !is_decision(after) {
        return Ok(());
    }

    config.location_permission = Some(after);
    config.save()?;
    tracing::info!(authorization = %after, "Saved location permission");
    Ok(())
}

/// Drop the saved decision so the next `show` prompts again.
fn forget_permission(config: &mut Config) {
    if let Some(previous) = config.location_permission.take() {
        tracing::info!(authorization = %previous, "Cleared saved location permission");
    }
}

fn is_decision(status: LocationAuthorization) -> bool {
    matches!(
        status,
        LocationAuthorization::Authorized
            | LocationAuthorization::Denied
            | LocationAuthorization::Restricted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn show_without_city_uses_location() {
        let cli = Cli::try_parse_from(["skysnapper", "show"]).expect("parse");
        assert!(matches!(cli.command, Command::Show { city: None }));
    }

    #[test]
    fn search_accepts_pick_and_verbose() {
        let cli =
            Cli::try_parse_from(["skysnapper", "search", "Portland", "--pick", "-v"]).expect("parse");
        assert!(cli.verbose);
        match cli.command {
            Command::Search { query, pick } => {
                assert_eq!(query, "Portland");
                assert!(pick);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn forgotten_denial_prompts_again() {
        use skysnapper_core::LocationPlatform;

        let mut config = Config {
            location_permission: Some(LocationAuthorization::Denied),
            ..Config::default()
        };
        forget_permission(&mut config);

        assert_eq!(config.location_permission, None);
        let platform = TerminalPlatform::from_config(&config);
        assert_eq!(platform.authorization_status(), LocationAuthorization::NotDetermined);
    }

    #[test]
    fn only_real_decisions_are_remembered() {
        assert!(is_decision(LocationAuthorization::Authorized));
        assert!(is_decision(LocationAuthorization::Restricted));
        assert!(!is_decision(LocationAuthorization::NotDetermined));
        assert!(!is_decision(LocationAuthorization::Unknown));
    }
}
