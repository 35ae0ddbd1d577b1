//! AuditVault CLI - Main entry point.

use anyhow::Context;
use auditvault::catalog::ArchiveQuery;
use auditvault::cli::{ArchiveCommands, Cli, Commands, HoldCommands, PolicyCommands};
use auditvault::config::VaultConfig;
use auditvault::retention::{ArchiveRequest, OperationQuery, PolicyUpdate, PurgeApproval};
use auditvault::RetentionSystem;
use serde::Serialize;
use std::io::Write;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let mut config = match &cli.config {
        Some(path) => VaultConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => VaultConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    match cli.command {
        Commands::Serve => auditvault::run(config).await?,
        command => {
            auditvault::observability::init(&config.observability)?;
            let system = RetentionSystem::open(config)?;
            execute(&system, command).await?;
        }
    }

    Ok(())
}

async fn execute(system: &RetentionSystem, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve => anyhow::bail!("serve runs as a long-lived service"),

        Commands::Reconcile => {
            let report = system.reconciler().run_once().await;
            print_json(&report)?;
        }

        Commands::Status => {
            print_json(&system.archives().get_retention_status()?)?;
        }

        Commands::Archive { command } => archive_command(system, command).await?,

        Commands::Hold { command } => match command {
            HoldCommands::Place {
                case,
                attorney,
                scope,
                archive_ids,
            } => {
                let hold_id = system
                    .holds()
                    .place_legal_hold(&case, &attorney, &scope, &archive_ids)
                    .await?;
                print_json(&system.holds().get_hold(&hold_id)?)?;
            }
            HoldCommands::Release { hold_id, attorney } => {
                let released = system.holds().release_legal_hold(&hold_id, &attorney).await?;
                print_json(&serde_json::json!({ "hold_id": hold_id, "released": released }))?;
            }
            HoldCommands::Show { hold_id } => {
                print_json(&system.holds().get_hold(&hold_id)?)?;
            }
            HoldCommands::List { active } => {
                print_json(&system.holds().list_holds(active)?)?;
            }
        },

        Commands::Policy { command } => match command {
            PolicyCommands::List => print_json(&system.archives().policies())?,
            PolicyCommands::Set {
                category,
                years,
                archive_after_days,
                legal_hold_capable,
                purge_approved,
                approved_by,
            } => {
                let update = PolicyUpdate {
                    retention_years: years,
                    archive_after_days,
                    legal_hold_capable,
                    purge_approved,
                };
                let policy = system
                    .archives()
                    .override_policy(category, update, &approved_by)?;
                print_json(&policy)?;
            }
        },

        Commands::Log {
            kind,
            archive,
            hold,
            since,
            limit,
        } => {
            let mut query = OperationQuery::new().limit(limit).time_range(since, None);
            if !kind.is_empty() {
                query = query.kinds(kind);
            }
            if let Some(archive) = archive {
                query = query.archive(archive);
            }
            if let Some(hold) = hold {
                query = query.hold(hold);
            }
            print_json(&system.query_operations(&query)?)?;
        }
    }

    Ok(())
}

async fn archive_command(system: &RetentionSystem, command: ArchiveCommands) -> anyhow::Result<()> {
    let archives = system.archives();

    match command {
        ArchiveCommands::Create {
            category,
            start,
            end,
            file,
            record_count,
            actor,
        } => {
            let payload =
                std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let mut request = ArchiveRequest::new(category, start, end, payload).with_actor(actor);
            if let Some(count) = record_count {
                request = request.with_record_count(count);
            }
            let archive_id = archives.create(request).await?;
            print_json(&archives.get_archive(&archive_id)?)?;
        }
        ArchiveCommands::Show { archive_id } => {
            print_json(&archives.get_archive(&archive_id)?)?;
        }
        ArchiveCommands::List {
            status,
            category,
            limit,
        } => {
            let mut query = ArchiveQuery::new();
            if let Some(status) = status {
                query = query.status(status);
            }
            if let Some(category) = category {
                query = query.category(category);
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            print_json(&archives.list_archives(&query)?)?;
        }
        ArchiveCommands::Verify { archive_id } => {
            let verified = archives.verify_archive_integrity(&archive_id).await?;
            print_json(&serde_json::json!({ "archive_id": archive_id, "verified": verified }))?;
            if !verified {
                std::process::exit(2);
            }
        }
        ArchiveCommands::Export { archive_id, out } => {
            let payload = archives.retrieve_archive(&archive_id).await?;
            match out {
                Some(path) => std::fs::write(&path, &payload)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => std::io::stdout().lock().write_all(&payload)?,
            }
        }
        ArchiveCommands::Purge {
            archive_id,
            approved_by,
            reason,
            dry_run,
        } => {
            if dry_run {
                print_json(&archives.purge_eligibility(&archive_id)?)?;
            } else {
                let approval = PurgeApproval {
                    approved_by,
                    reason,
                };
                print_json(&archives.purge_archive(&archive_id, approval).await?)?;
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
