//! Update CLI entry point

use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::process::ExitCode;
use update::cli::Args;
use update::report::Reporter;
use update::{format_error, CheckboxPrompt, Config, Event, EventBus, UpdateEngine};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let failed = match run(&args).await {
        Ok(failed) => failed,
        Err(err) => {
            eprintln!("{}", format_error(&err));
            true
        }
    };

    // Output must drain before the exit code is reported.
    let _ = std::io::stdout().flush();
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Returns `true` when any task failed
async fn run(args: &Args) -> Result<bool> {
    let mut config = Config::load_from(&args.config_path())?;
    args.apply_to(&mut config);

    let cwd = match &args.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir()?,
    };

    log::debug!("update v{}", env!("CARGO_PKG_VERSION"));
    let bus = EventBus::default();
    let reporter = Reporter::spawn(&bus, config.verbose);
    let built = UpdateEngine::from_config(config, cwd, bus.clone(), Box::new(CheckboxPrompt));
    let engine = match built {
        Ok(engine) => engine,
        Err(err) => {
            bus.emit(Event::Finished { ok: false });
            let _ = reporter.await;
            return Err(err);
        }
    };

    let mut answers = Vec::new();
    let ran = if args.tokens.is_empty() && args.has_store_flags() {
        Ok(())
    } else {
        engine.run(&args.tokens).await
    };
    let outcome = match ran {
        Ok(()) if args.has_store_flags() => {
            let mut store = engine
                .store()
                .lock()
                .map_err(|_| anyhow::anyhow!("store lock poisoned"))?;
            args.apply_store_flags(&mut store).map(|has| answers = has)
        }
        other => other,
    };

    engine.bus().emit(Event::Finished {
        ok: outcome.is_ok(),
    });
    let task_failed = reporter.await?;
    for answer in answers {
        println!("{}", answer);
    }

    match outcome {
        Ok(()) => Ok(task_failed),
        // Task errors were already printed by the reporter.
        Err(err) if task_failed => {
            log::debug!("Run failed: {}", err);
            Ok(true)
        }
        Err(err) => Err(err),
    }
}
