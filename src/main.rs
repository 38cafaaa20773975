//! fairgate - FAIR-software compliance validation and remediation
//!
//! Checks hosted repositories for the files the FAIR software recommendations
//! expect, drafts the missing metadata, and proposes it through pull requests.

use anyhow::Result;
use fairgate::audit::RunOptions;
use fairgate::cli::{
    audit, audit_pending, forget, github_client, load_config, open_database, print_outcome,
    print_records, print_report, print_stats, remediate, request, status, synth, Cli, Commands,
    ConfigArgs, OutputFormat,
};
use fairgate::config::Config;
use fairgate::logging;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    logging::init(cli.verbose, cli.log_json);

    // A reset must work even when the file is missing or unreadable
    let config = match cli.command {
        Commands::Config(ref args) if args.reset => Config::default(),
        _ => load_config(cli.config.as_deref(), cli.database.clone(), cli.token.clone())?,
    };

    match cli.command {
        Commands::Audit(args) => {
            let db = open_database(&config)?;
            let host = github_client(&config)?;
            let repo = &args.target.repo;

            if args.pending {
                match audit_pending(&host, &db, &config, repo).await? {
                    Some((report, update)) => print_report(&report, Some(&update), cli.format)?,
                    None => println!("No actions pending on the tracking issue for {}", repo),
                }
            } else {
                let options = RunOptions {
                    full: !args.light,
                    draft: args.draft,
                };
                let (report, update) =
                    audit(&host, &db, &config, repo, options, args.dashboard).await?;
                print_report(&report, update.as_ref(), cli.format)?;
            }
        }

        Commands::Synth(args) => {
            let host = github_client(&config)?;
            let content = synth(&host, &args.target.repo, args.artifact).await?;

            match args.output {
                Some(path) => {
                    std::fs::write(&path, &content)?;
                    println!("✓ Wrote {}", path.display());
                }
                None => print!("{}", content),
            }
        }

        Commands::Remediate(args) => {
            let db = open_database(&config)?;
            let host = github_client(&config)?;
            let result = remediate(
                &host,
                &db,
                &config,
                &args.target.repo,
                args.artifact,
                args.spdx.as_deref(),
            )
            .await;

            match result {
                Ok(outcome) => print_outcome(&outcome, cli.format)?,
                Err(e) if e.is_duplicate() => println!("Nothing to do: {}", e),
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Request(args) => {
            let host = github_client(&config)?;
            match request(&host, &config, &args.target.repo, args.action).await {
                Ok(url) => println!("✓ Queued {} on {}", args.action, url),
                Err(e) if e.is_duplicate() => println!("Nothing to do: {}", e),
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Status(args) => {
            let db = open_database(&config)?;
            let records = status(&db, &args.target.repo)?;
            print_records(&records, args.detailed, cli.format)?;

            if args.detailed && cli.format == OutputFormat::Text {
                print_stats(&db.stats()?, cli.format)?;
            }
        }

        Commands::Forget(args) => {
            let db = open_database(&config)?;
            if forget(&db, &args.target.repo)? {
                println!("✓ Removed {} from the store", args.target.repo);
            } else {
                println!("{} is not in the store", args.target.repo);
            }
        }

        Commands::Config(args) => {
            handle_config(cli.config.as_deref(), &config, &args)?;
        }
    }

    Ok(())
}

/// Handle config command
fn handle_config(path: Option<&Path>, config: &Config, args: &ConfigArgs) -> Result<()> {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => Config::default_path(),
    };

    if args.path {
        match config_path {
            Some(ref p) => println!("{}", p.display()),
            None => println!("No configuration directory available"),
        }
    }

    if args.reset {
        let Some(ref p) = config_path else {
            anyhow::bail!("No configuration directory available; pass --config");
        };
        Config::default().save(p)?;
        println!("✓ Configuration reset to defaults");
    }

    if args.show || (!args.path && !args.reset) {
        println!("fairgate Configuration");
        println!("======================\n");

        println!("API: {}", config.github.api_url);
        println!(
            "Token: {}",
            if config.github.token.is_some() { "set" } else { "not set" }
        );
        println!(
            "Retries: {} attempts, {}ms backoff step, {}s longest wait",
            config.github.max_attempts,
            config.github.base_backoff_ms,
            config.github.max_retry_wait_secs
        );
        println!("Bot: {}", config.bot.login());
        println!("Database: {}", config.database_path()?.display());

        println!("\nWorkflow suffixes:");
        for suffix in &config.scan.workflow_suffixes {
            println!("  - {}", suffix);
        }
        println!("Walk depth: {}", config.scan.max_depth);
    }

    Ok(())
}
