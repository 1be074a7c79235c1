use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use futures::stream::{self, StreamExt};
use sqlx::ConnectOptions;
use sqlx_core::Url;
use sqlx_postgres::{PgConnectOptions, PgPoolOptions};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use pgdrop::config::Config;
use pgdrop::dependent_builder::DependentBuilder;
use pgdrop::script_builder::{MigrationOptions, ScriptBuilder};
use pgdrop::{plan, resolve, ExpandOptions};

/// Find the views depending on tables or views and the order to drop them in.
#[derive(Parser)]
#[command(name = "pgdrop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to an optional JSON config file.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Postgres connection string. Falls back to DB_URL in the config file.
    #[arg(short, long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Dependency queries allowed in flight at once.
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Abort when the dependency closure grows beyond this many entities.
    #[arg(long)]
    max_entities: Option<usize>,

    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the order in which dependent views can be dropped.
    Order {
        #[arg(required = true)]
        names: Vec<String>,

        /// Print DROP statements instead of names.
        #[arg(long)]
        sql: bool,
    },

    /// Write a Liquibase changelog recreating every dependent view.
    Migrate {
        #[arg(required = true)]
        names: Vec<String>,

        #[arg(short, long)]
        author: Option<String>,

        /// Changeset id prefix. Defaults to the current time in milliseconds.
        #[arg(long)]
        id: Option<String>,

        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Print changelogs instead of writing them.
        #[arg(long)]
        dry_run: bool,
    },

    /// List every view depending on one table or view.
    Deps { name: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::load(&cli.config)?;
    let db_url = cli
        .database_url
        .clone()
        .or_else(|| config.db_url.clone())
        .context("no database url: pass --database-url, set DATABASE_URL or DB_URL in the config")?;

    let expand_options = ExpandOptions {
        concurrency: cli
            .concurrency
            .or(config.concurrency)
            .unwrap_or(ExpandOptions::default().concurrency)
            .max(1),
        max_entities: cli
            .max_entities
            .or(config.max_entities)
            .or(ExpandOptions::default().max_entities),
        resolve_timeout: config.resolve_timeout_secs.map(Duration::from_secs),
    };

    let url: Url = db_url
        .parse()
        .context("could not parse connection string into URL")?;
    let connect_options = PgConnectOptions::from_url(&url)?;
    let pool = PgPoolOptions::new()
        .max_connections(u32::try_from(expand_options.concurrency).unwrap_or(u32::MAX))
        .connect_with(connect_options)
        .await
        .context("failed to connect to database")?;
    let builder = DependentBuilder::new(pool);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, finishing in-flight queries");
            ctrl_c.cancel();
        }
    });

    match cli.command {
        Commands::Order { names, sql } => {
            let drop_plan = plan(&builder, names.iter().cloned(), &expand_options, &cancel).await?;

            if sql {
                let roots: BTreeSet<&str> = names.iter().map(String::as_str).collect();
                let options = MigrationOptions::default();
                let mut script = ScriptBuilder::new(&options);
                script.build_drop_script(drop_plan.order.iter().filter(|name| !roots.contains(name)));
                script.display();
            } else {
                for (ix, name) in drop_plan.order.iter().enumerate() {
                    println!("{:>4} {}", (ix + 1).to_string().dimmed(), name.bold());
                }
            }
        }

        Commands::Migrate {
            names,
            author,
            id,
            out_dir,
            dry_run,
        } => {
            let defaults = MigrationOptions::default();
            let options = MigrationOptions {
                author: author.or(config.author.clone()).unwrap_or(defaults.author),
                id: id.unwrap_or(defaults.id),
                out_dir: out_dir.or(config.out_dir.clone()).unwrap_or(defaults.out_dir),
                filename_format: config.filename_format.clone(),
            };

            let drop_plan = plan(&builder, names.iter().cloned(), &expand_options, &cancel).await?;
            let roots: BTreeSet<&str> = names.iter().map(String::as_str).collect();

            // creation order is the reverse of drop order
            let dependents: Vec<String> = drop_plan
                .order
                .as_slice()
                .iter()
                .rev()
                .filter(|name| !roots.contains(name.as_str()))
                .cloned()
                .collect();

            let views: Vec<_> = stream::iter(dependents)
                .map(|name| {
                    let builder = builder.clone();
                    async move {
                        let data = builder.get_view_data(&name).await;
                        (name, data)
                    }
                })
                .buffered(expand_options.concurrency)
                .collect()
                .await;

            let mut written = 0;
            for (name, data) in views {
                let Some(view) = data.with_context(|| format!("failed to read definition of {name}"))? else {
                    warn!(entity = %name, "not a view, skipping");
                    continue;
                };
                let grants = builder
                    .get_view_grants(&view)
                    .await
                    .with_context(|| format!("failed to read grants of {name}"))?;
                let permissions = ScriptBuilder::get_permissions_script(&view, &grants);

                let mut script = ScriptBuilder::new(&options);
                script.build_migration(&view, &permissions);
                if dry_run {
                    println!("{}", format!("-- {}", view.get_full_name()).bold().bright_magenta());
                    script.display();
                } else {
                    let path = script.get_filename(&view);
                    script.save_file(&path)?;
                    println!("Committed File To {}", path.display());
                }
                written += 1;
            }
            info!(migrations = written, dry_run, "migration generation finished");
        }

        Commands::Deps { name } => {
            let dependents = resolve(&builder, &name).await?;
            if dependents.is_empty() {
                println!("{} has no dependent views", name.bold());
            }
            for dependent in dependents {
                match builder.get_view_data(&dependent).await? {
                    Some(view) => println!("{view}"),
                    None => println!("{}", dependent.bold().bright_magenta()),
                }
            }
        }
    }

    Ok(())
}
