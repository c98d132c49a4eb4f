use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contact_form::{ContactSection, HttpFormTransport, StaticToken};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "contact-cli", about = "Submit the site contact form")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Post a contact form with an already solved captcha token.
    Submit {
        #[arg(long)]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        message: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        endpoint: Option<String>,
        #[arg(long)]
        page_url: Option<String>,
    },
    /// Print the effective settings.
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let mut settings = load_settings();

    match cli.command {
        Command::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&settings.report())?);
        }
        Command::Submit {
            first_name,
            last_name,
            email,
            message,
            token,
            endpoint,
            page_url,
        } => {
            if let Some(endpoint) = endpoint {
                settings.form_endpoint = endpoint;
            }
            if let Some(page_url) = page_url {
                settings.page_url = page_url;
            }

            let endpoint = settings.endpoint_url()?;
            info!(%endpoint, "submitting contact form");
            let transport = HttpFormTransport::with_timeout(endpoint, settings.request_timeout())
                .context("failed to build form transport")?;
            let mut section = ContactSection::new(
                Arc::new(StaticToken(token)),
                Arc::new(transport),
                settings.page_url.clone(),
            );
            {
                let form = section.form_mut();
                form.first_name = first_name;
                form.last_name = last_name;
                form.email = email;
                form.message = message;
            }

            let outcome = section.submit().await;
            if let Some(status) = section.status() {
                println!("{}", status.message);
            }
            outcome.context("contact form was not submitted")?;
        }
    }

    Ok(())
}
