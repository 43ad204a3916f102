#![allow(missing_docs)]
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use oauth_handler::{OAuthHandler, OAuthHandlerSettings, RequestSender};
use reqwest::{Method, Request, Url};
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SETTINGS_FILES: [&str; 2] = ["settings.development.json", "settings.json"];
const CODE_SYSTEM_SUMMARY: &str = "terminology/fhir/CodeSystem?_summary=true";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let AppArgs { config } = AppArgs::parse().context("parsing arguments")?;
    let settings = Settings::load(config).await?;

    let url = settings.summary_url()?;
    let handler = OAuthHandler::new(settings.authentication);

    info!(%url, "fetching code systems");
    let response = handler
        .send(Request::new(Method::GET, url))
        .await?
        .error_for_status()?;
    let content = response.text().await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{content}");
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Settings {
    #[serde(alias = "EndpointUrl")]
    endpoint_url: String,
    #[serde(alias = "Authentication")]
    authentication: OAuthHandlerSettings,
}

impl Settings {
    async fn load(config: Option<PathBuf>) -> Result<Self> {
        let path = match config {
            Some(path) => path,
            None => find_settings_file().await?,
        };

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let settings = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        info!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    fn summary_url(&self) -> Result<Url> {
        let url = format!(
            "{}/{CODE_SYSTEM_SUMMARY}",
            self.endpoint_url.trim_end_matches('/')
        );
        url.parse()
            .with_context(|| format!("invalid endpoint URL '{}'", self.endpoint_url))
    }
}

async fn find_settings_file() -> Result<PathBuf> {
    for name in SETTINGS_FILES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(path);
        }
    }
    bail!("no settings file found, expected one of {SETTINGS_FILES:?}")
}

#[derive(Debug)]
struct AppArgs {
    config: Option<PathBuf>,
}

impl AppArgs {
    fn parse() -> Result<Self> {
        let mut pargs = pico_args::Arguments::from_env();

        let config = pargs
            .opt_value_from_str(["-c", "--config"])
            .context("parsing config argument")?;

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            warn!(?remaining, "Warning: unused arguments left");
        }
        Ok(Self { config })
    }
}
