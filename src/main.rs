//! gemini - drive a CounterSoft Gemini tracker the way a release host does.

use std::io::{self, BufRead};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use gemini_provider::api::auth;
use gemini_provider::config::{Config, ConnectionSettings};
use gemini_provider::error::ProviderError;
use gemini_provider::{logging, GeminiProvider, IssueTracker};

#[derive(Parser)]
#[command(name = "gemini")]
#[command(about = "Release-host issue tracking for CounterSoft Gemini", version)]
#[command(after_help = "EXAMPLES:
    gemini configure --url http://gemini:8080 --username build --password-stdin
    gemini project 12
    gemini issues 2.4.0
    gemini close WEB-42")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON for scripting
    #[arg(long, global = true)]
    json: bool,

    /// Also write debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the Gemini server URL and credentials
    Configure {
        /// The Gemini server URL, e.g. http://gemini:8080
        #[arg(long)]
        url: String,
        /// The Gemini user name
        #[arg(long)]
        username: String,
        /// Read the password from the first line of stdin
        #[arg(long)]
        password_stdin: bool,
        /// Store the password in the OS keyring instead of the config file
        #[arg(long, requires = "password_stdin")]
        keyring: bool,
    },
    /// Select the project issues are looked up in
    Project {
        /// Numeric project ID (see `gemini categories`)
        id: String,
    },
    /// List projects
    Categories,
    /// Check that the server can be reached
    Validate,
    /// List the issues fixed in a release
    Issues {
        /// Release number, matched case-insensitively
        release: String,
        /// Use this project instead of the configured one
        #[arg(long)]
        project: Option<String>,
    },
    /// Append text to an issue's description
    Append {
        /// Issue key (e.g., WEB-42)
        issue: String,
        /// Text to append
        text: String,
    },
    /// Change an issue's status by name
    Status {
        /// Issue key (e.g., WEB-42)
        issue: String,
        /// Status name (e.g., "In Progress")
        status: String,
    },
    /// Close an issue
    Close {
        /// Issue key (e.g., WEB-42)
        issue: String,
    },
    /// Print the browser link for an issue
    Url {
        /// Issue key (e.g., WEB-42)
        issue: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Warning: logging disabled: {e}");
    }

    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        match e.downcast_ref::<ProviderError>() {
            Some(provider_error) => {
                eprintln!("Error: {}", provider_error.user_message());
                if let Some(action) = provider_error.suggested_action() {
                    eprintln!("Hint: {action}");
                }
            }
            None => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Configure {
            url,
            username,
            password_stdin,
            keyring,
        } => configure(url, username, password_stdin, keyring)?,
        Commands::Project { id } => {
            let mut config = Config::load().map_err(ProviderError::from)?;
            config.category_filter = vec![id];
            let path = config.save().map_err(ProviderError::from)?;
            println!("Saved project filter to {}", path.display());
        }
        command => {
            let config = Config::load().map_err(ProviderError::from)?;
            config
                .connection
                .validate()
                .map_err(ProviderError::from)?;
            let mut provider = GeminiProvider::from_config(config);

            match command {
                Commands::Categories => {
                    let categories = provider.list_categories().await?;
                    print_list(cli.json, &categories)?;
                }
                Commands::Validate => {
                    provider.validate_connection().await?;
                    println!("Connected to {}", provider.settings().base_url);
                }
                Commands::Issues { release, project } => {
                    if let Some(project) = project {
                        provider.set_category_filter(vec![project]);
                    }
                    if provider.category_filter().is_empty() {
                        eprintln!("No project selected; run 'gemini project <ID>' first.");
                    }
                    let issues = provider.get_issues(&release).await?;
                    if cli.json {
                        print_json(&issues)?;
                    } else {
                        for issue in &issues {
                            let state = if provider.is_issue_closed(issue) {
                                "closed"
                            } else {
                                "open"
                            };
                            println!("{}\t{}\t{}\t{}", issue.id(), issue.status(), state, issue.title());
                        }
                    }
                }
                Commands::Append { issue, text } => {
                    provider.append_issue_description(&issue, &text).await?;
                    println!("Updated {}", issue);
                }
                Commands::Status { issue, status } => {
                    provider.change_issue_status(&issue, &status).await?;
                    println!("{} is now {}", issue, status);
                }
                Commands::Close { issue } => {
                    provider.close_issue(&issue).await?;
                    println!("Closed {}", issue);
                }
                Commands::Url { issue } => {
                    println!("{}", provider.issue_url(&issue)?);
                }
                Commands::Configure { .. } | Commands::Project { .. } => {
                    // Already handled above
                }
            }
        }
    }

    Ok(())
}

/// Write connection settings, keeping any existing project filter.
fn configure(url: String, username: String, password_stdin: bool, keyring: bool) -> Result<()> {
    let password = if password_stdin {
        Some(read_password()?)
    } else {
        None
    };

    let mut config = Config::load().map_err(ProviderError::from)?;
    let previous_password = config.connection.password.take();
    let file_password = match (&password, keyring) {
        (Some(password), true) => {
            auth::store_password(&username, password).map_err(ProviderError::from)?;
            None
        }
        (Some(password), false) => Some(password.as_str()),
        (None, _) => previous_password.as_deref(),
    };

    let settings = ConnectionSettings::new(&url, &username, file_password);
    settings.validate().map_err(ProviderError::from)?;
    config.connection = settings;

    let path = config.save().map_err(ProviderError::from)?;
    println!("Saved connection settings to {}", path.display());
    if keyring {
        println!("Password stored in the OS keyring");
    }
    Ok(())
}

fn read_password() -> Result<String> {
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn print_list<T: Serialize + std::fmt::Display>(json: bool, items: &[T]) -> Result<()> {
    if json {
        return print_json(items);
    }
    for item in items {
        println!("{}", item);
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{}", out);
    Ok(())
}
