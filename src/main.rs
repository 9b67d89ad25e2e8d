mod api;
mod browser;
mod config;
mod db;
mod enrich;
mod error;
mod links;
mod miner;
mod models;
mod pipeline;
mod providers;
mod retry;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::Config;
use db::Database;
use models::Company;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "jobscout")]
#[command(about = "Enrich a list of companies with their websites and careers pages, then collect job offers")]
struct Cli {
    /// SQLite database file (overrides JOBSCOUT_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Add companies to enrich
    Import {
        /// Company names
        names: Vec<String>,

        /// File with one company name per line
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Also import the Tech 500 ranking, flagged as top 500
        #[arg(long)]
        top500: bool,
    },

    /// Enrich every company, then collect matching job offers
    Enrich {
        /// Companies enriched at the same time
        #[arg(short, long)]
        workers: Option<usize>,

        /// Careers pages scanned at the same time
        #[arg(long)]
        offer_workers: Option<usize>,

        /// Pause after a rate-limited registry answer
        #[arg(long)]
        cooldown_secs: Option<u64>,
    },

    /// Manage companies
    Companies {
        #[command(subcommand)]
        command: CompanyCommands,
    },

    /// Manage job offers
    Offers {
        #[command(subcommand)]
        command: OfferCommands,
    },

    /// Serve the read-only HTTP API
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        addr: String,
    },
}

#[derive(Subcommand)]
enum CompanyCommands {
    /// List all companies
    List,

    /// Show company details and its offers
    Show {
        /// Company name
        name: String,
    },

    /// Delete a company
    Delete {
        /// Company name
        name: String,
    },
}

#[derive(Subcommand)]
enum OfferCommands {
    /// List job offers
    List {
        /// Only offers of this company
        #[arg(short, long)]
        company: Option<String>,
    },

    /// Delete a job offer
    Delete {
        /// Offer URL
        url: String,
    },
}

/// Insert the names not stored yet. Returns (added, skipped).
fn import_names(db: &Database, names: &[String], top_500: bool) -> Result<(usize, usize)> {
    let mut added = 0;
    let mut skipped = 0;

    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        let company = Company {
            is_top_500: top_500,
            ..Company::named(name)
        };
        match db.insert_company(&company) {
            Ok(()) => added += 1,
            Err(error::PersistenceError::DuplicateCompany(_)) => {
                info!(company = %name, "Already stored, skipping");
                skipped += 1;
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to import '{}'", name)),
        }
    }

    Ok((added, skipped))
}

fn read_names_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,jobscout=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(path) = cli.db {
        config.db_path = path;
    }
    let db = Database::open(&config.db_path)?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", config.db_path.display());
        }

        Commands::Import { names, file, top500 } => {
            db.ensure_initialized()?;
            let mut names = names;
            if let Some(path) = &file {
                names.extend(read_names_file(path)?);
            }
            let (mut added, mut skipped) = import_names(&db, &names, false)?;

            if top500 {
                let source = providers::Tech500Source::new(providers::http_client()?);
                let ranked = source.fetch_names().await.context("Failed to fetch the Tech 500 list")?;
                let (a, s) = import_names(&db, &ranked, true)?;
                added += a;
                skipped += s;
            }

            println!("Imported {} companies ({} already stored).", added, skipped);
        }

        Commands::Enrich {
            workers,
            offer_workers,
            cooldown_secs,
        } => {
            db.ensure_initialized()?;
            let mut settings = config.pipeline.clone();
            if let Some(workers) = workers {
                settings.enrich_workers = workers;
                settings.offer_workers = 2 * workers;
            }
            if let Some(offer_workers) = offer_workers {
                settings.offer_workers = offer_workers;
            }
            if let Some(secs) = cooldown_secs {
                settings.rate_limit.cooldown = Duration::from_secs(secs);
            }

            let api_key = config.crunchbase_api_key()?;
            let engine: Arc<dyn browser::AutomationEngine> = browser::WebDriverEngine::connect(&config.webdriver_url)
                .await
                .with_context(|| format!("Failed to start browser at {}", config.webdriver_url))?;

            let db = Arc::new(db);
            let render = settings.render.clone();
            let report = pipeline::run_with_engine(Arc::clone(&db), engine, settings, |engine| {
                providers::Providers::reference(api_key, engine, render)
            })
            .await?;

            println!(
                "Enriched {}/{} companies, scanned {}/{} careers pages.",
                report.enrichment.completed,
                report.enrichment.scheduled,
                report.mining.completed,
                report.mining.scheduled
            );
            let panicked = report.enrichment.panicked + report.mining.panicked;
            if panicked > 0 {
                warn!(panicked, "Some tasks crashed, see the log above");
            }
            println!("{} job offers stored.", db.list_offers()?.len());
        }

        Commands::Companies { command } => {
            db.ensure_initialized()?;
            match command {
                CompanyCommands::List => {
                    let companies = db.list_companies()?;
                    if companies.is_empty() {
                        println!("No companies found.");
                    } else {
                        println!("{:<25} {:<4} {:<30} {:<35}", "NAME", "TOP", "WEBSITE", "CAREERS");
                        println!("{}", "-".repeat(96));
                        for company in companies {
                            println!(
                                "{:<25} {:<4} {:<30} {:<35}",
                                truncate(&company.name, 23),
                                if company.is_top_500 { "yes" } else { "" },
                                truncate(&company.website_url, 28),
                                truncate(&company.job_page_url, 33)
                            );
                        }
                    }
                }

                CompanyCommands::Show { name } => match db.get_company(&name)? {
                    Some(company) => {
                        println!("Company: {}", company.name);
                        if company.is_top_500 {
                            println!("Top 500: yes");
                        }
                        for (label, value) in [
                            ("Website", &company.website_url),
                            ("LinkedIn", &company.linkedin_url),
                            ("WTTJ", &company.wttj_url),
                            ("Careers", &company.job_page_url),
                        ] {
                            if !value.is_empty() {
                                println!("{}: {}", label, value);
                            }
                        }
                        let offers = db.list_company_offers(&company.name)?;
                        if !offers.is_empty() {
                            println!("\nOffers ({}):", offers.len());
                            for offer in offers {
                                println!("  {}", offer.offer_url);
                            }
                        }
                    }
                    None => {
                        println!("Company '{}' not found.", name);
                    }
                },

                CompanyCommands::Delete { name } => {
                    if db.delete_company(&name)? {
                        println!("Deleted '{}'.", name);
                    } else {
                        println!("Company '{}' not found.", name);
                    }
                }
            }
        }

        Commands::Offers { command } => {
            db.ensure_initialized()?;
            match command {
                OfferCommands::List { company } => {
                    let offers = match &company {
                        Some(name) => db.list_company_offers(name)?,
                        None => db.list_offers()?,
                    };
                    if offers.is_empty() {
                        println!("No offers found.");
                    } else {
                        println!("{:<20} {:<20} {:<60}", "DISCOVERED", "COMPANY", "URL");
                        println!("{}", "-".repeat(100));
                        for offer in offers {
                            println!(
                                "{:<20} {:<20} {:<60}",
                                offer.discovered_at.unwrap_or_default(),
                                truncate(&offer.company_name, 18),
                                offer.offer_url
                            );
                        }
                    }
                }

                OfferCommands::Delete { url } => {
                    if db.delete_offer(&url)? {
                        println!("Deleted offer {}.", url);
                    } else {
                        println!("Offer {} not found.", url);
                    }
                }
            }
        }

        Commands::Serve { addr } => {
            db.ensure_initialized()?;
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!(addr = %addr, "Serving read API");
            axum::serve(listener, api::router(Arc::new(db)))
                .await
                .context("API server failed")?;
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
