use std::io::{self, BufRead};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use mailverify_lib::{
    CancelToken, Engine, EngineConfig, MemoryStore, Stores, VerificationRequest, logging,
};

mod args;
mod monitor;
mod output;
mod skiplist;

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log);

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .await
            .with_context(|| format!("load {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let store = Arc::new(MemoryStore::new());
    if let Some(state) = &cli.state {
        store
            .load_skip_list(state)
            .await
            .with_context(|| format!("load skip list {}", state.display()))?;
    }

    let exit = match cli.cmd {
        Commands::Verify {
            emails,
            stdin,
            format,
            out,
            source,
        } => {
            let engine = Engine::from_config(&config, Stores::memory(store.clone())).await?;
            let mut addresses = emails;
            if stdin {
                for line in io::stdin().lock().lines() {
                    let line = line.context("read stdin")?;
                    if !line.trim().is_empty() {
                        addresses.push(line);
                    }
                }
            }
            if addresses.is_empty() {
                bail!("no address given, pass them as arguments or use --stdin");
            }

            let requests = addresses
                .into_iter()
                .map(|address| {
                    let request = VerificationRequest::new(address);
                    match &source {
                        Some(tag) => request.with_source(tag.clone()),
                        None => request,
                    }
                })
                .collect();
            let cancel = cancel_on_ctrl_c();
            let results = engine.verifier.verify_requests(requests, &cancel).await;
            output::write_reports(&results, &format, out.as_deref())?;
            if output::any_undeliverable(&results) { 2 } else { 0 }
        }
        Commands::Bulk {
            source,
            owner,
            artifact_dir,
            workers,
        } => {
            let mut config = config;
            if let Some(dir) = artifact_dir {
                config.bulk.artifact_dir = dir;
            }
            if let Some(workers) = workers {
                config.bulk.workers = workers;
            }
            let engine = Engine::from_config(&config, Stores::memory(store.clone())).await?;
            run_bulk(&engine, &owner, &source).await?
        }
        Commands::Skiplist { action } => {
            let Some(state) = &cli.state else {
                bail!("skiplist commands need --state <file>");
            };
            skiplist::run(store.clone(), &config, action).await?;
            store.save_skip_list(state).await?;
            return Ok(());
        }
        Commands::Monitor { check } => monitor::run(&config, check).await?,
    };

    if let Some(state) = &cli.state {
        store
            .save_skip_list(state)
            .await
            .with_context(|| format!("save skip list {}", state.display()))?;
    }
    std::process::exit(exit);
}

async fn run_bulk(engine: &Engine, owner: &str, source: &Path) -> Result<i32> {
    let job = engine.bulk.create_job(owner, source).await?;
    let cancel = cancel_on_ctrl_c();
    match engine.bulk.run(&job.id, &cancel).await {
        Ok(done) => {
            println!("{}", serde_json::to_string_pretty(&done)?);
            Ok(0)
        }
        Err(err) => {
            let failed = engine.bulk.job(&job.id).await?;
            println!("{}", serde_json::to_string_pretty(&failed)?);
            eprintln!("job {} failed: {err}", job.id);
            Ok(1)
        }
    }
}

fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted, finishing in-flight checks");
            trigger.cancel();
        }
    });
    cancel
}
