//! `defect-engine`: operator commands over the defect workflow database.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io::{self, Write};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use mockable::DefaultClock;
use ortho_config::OrthoConfig;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use repair_backend::config::LifecycleSettings;
use repair_backend::domain::defects::{DefectStateMachine, DefectStatsFilter};
use repair_backend::domain::ports::DefectLifecycleQuery;
use repair_backend::domain::{
    DefectId, DefectLifecycleService, HistoryDispatcher, InventoryLedger, LifecycleCollaborators,
    LifecyclePorts, ServerId, SubstitutePoolCoordinator, TableSlaCalculator,
    VendorTicketCoordinator,
};
use repair_backend::outbound::persistence::{
    DbPool, DieselDefectRepository, DieselDirectory, DieselHistorySink, DieselInventoryRepository,
    DieselSubstitutePoolRepository, DieselVendorTicketRepository, DieselWorkflowStore,
    run_pending_migrations,
};
use repair_backend::outbound::vendor::LocalVendorGateway;

/// `defect-engine` command arguments.
#[derive(Debug, Parser)]
#[command(
    name = "defect-engine",
    about = "Inspect and maintain the hardware defect workflow database",
    version
)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending schema migrations.
    Migrate,
    /// Print defect statistics as JSON.
    Stats {
        /// Only count defects of this server.
        #[arg(long, value_name = "uuid")]
        server: Option<ServerId>,
    },
    /// Print one defect record as JSON.
    Show {
        /// Defect identifier.
        defect: DefectId,
    },
    /// Print the actions an operator may take on a defect.
    Actions {
        /// Defect identifier.
        defect: DefectId,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %error, "tracing init failed");
    }

    let args = CliArgs::parse();
    let settings = LifecycleSettings::load_from_iter([OsString::from("defect-engine")])
        .map_err(|error| eyre!("load DEFECTS_* settings: {error}"))?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .wrap_err("create Tokio runtime")?;
    runtime.block_on(run(args.command, settings))
}

async fn run(command: Command, settings: LifecycleSettings) -> Result<()> {
    let pool_config = settings
        .pool_config()
        .ok_or_else(|| eyre!("DEFECTS_DATABASE_URL is not set"))?;

    if matches!(command, Command::Migrate) {
        let url = pool_config.database_url().to_owned();
        let applied = tokio::task::spawn_blocking(move || run_pending_migrations(&url))
            .await
            .wrap_err("migration task")??;
        info!(applied, "schema up to date");
        return Ok(());
    }

    let pool = DbPool::new(pool_config)
        .await
        .wrap_err("create database pool")?;
    let (service, history, worker) = assemble(&pool, &settings);

    match command {
        Command::Migrate => {}
        Command::Stats { server } => {
            let stats = service
                .stats(DefectStatsFilter {
                    server_id: server,
                    ..DefectStatsFilter::default()
                })
                .await?;
            print_json(&stats)?;
        }
        Command::Show { defect } => print_json(&service.get(defect).await?)?,
        Command::Actions { defect } => print_json(&service.available_actions(defect).await?)?,
    }

    drop(service);
    history.flush().await;
    drop(history);
    if let Err(error) = worker.await {
        warn!(%error, "history worker stopped abnormally");
    }
    Ok(())
}

fn assemble(
    pool: &DbPool,
    settings: &LifecycleSettings,
) -> (DefectLifecycleService, HistoryDispatcher, JoinHandle<()>) {
    let clock = Arc::new(DefaultClock);
    let store = Arc::new(DieselWorkflowStore::new(pool.clone()));
    let directory = Arc::new(DieselDirectory::new(pool.clone()));
    let (history, worker) = HistoryDispatcher::spawn(
        Arc::new(DieselHistorySink::new(pool.clone())),
        settings.history_config(),
    );
    let ledger = InventoryLedger::new(
        Arc::new(DieselInventoryRepository::new(pool.clone())),
        store.clone(),
        history.clone(),
        clock.clone(),
    );
    let service = DefectLifecycleService::new(
        LifecyclePorts {
            defects: Arc::new(DieselDefectRepository::new(pool.clone())),
            servers: directory.clone(),
            users: directory,
            store,
            sla: Arc::new(TableSlaCalculator::new(settings.sla_policy())),
        },
        LifecycleCollaborators {
            ledger,
            tickets: VendorTicketCoordinator::new(
                Arc::new(DieselVendorTicketRepository::new(pool.clone())),
                Arc::new(LocalVendorGateway::new(clock.clone())),
            ),
            substitutes: SubstitutePoolCoordinator::new(Arc::new(
                DieselSubstitutePoolRepository::new(pool.clone()),
            )),
            history: history.clone(),
            machine: DefectStateMachine,
        },
        settings.lifecycle_config(),
        clock,
    );
    (service, history, worker)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value).wrap_err("encode output")?;
    writeln!(out).wrap_err("write output")?;
    Ok(())
}
