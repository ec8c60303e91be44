use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use routeswap::cli::{Cli, Command, DemoArgs, ResolveArgs};
use routeswap::demo;
use routeswap::error::RouteError;
use routeswap::loader::TableLoader;
use routeswap::output;
use routeswap::registry::RouteTableRegistry;
use routeswap::resolver::Resolver;

/// Global shutdown flag, set by signal handlers.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

fn install_signal_handlers() {
    unsafe {
        libc::signal(
            libc::SIGTERM,
            signal_handler as *const () as libc::sighandler_t,
        );
        libc::signal(
            libc::SIGINT,
            signal_handler as *const () as libc::sighandler_t,
        );
    }
}

fn exit_code(err: &RouteError) -> i32 {
    match err {
        RouteError::Config(_) => 1,
        RouteError::Load(_) | RouteError::InvalidRecord { .. } => 2,
        RouteError::Output(_) => 3,
        RouteError::Fatal(_) => 4,
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| run(cli)));

    match result {
        Ok(Ok(())) => std::process::exit(0),
        Ok(Err(e)) => {
            eprintln!("error: {e}");
            std::process::exit(exit_code(&e));
        }
        Err(_) => {
            eprintln!("error: fatal: unexpected panic");
            std::process::exit(4);
        }
    }
}

fn run(cli: Cli) -> Result<(), RouteError> {
    install_signal_handlers();

    match cli.command_or_default() {
        Command::Demo(args) => run_demo(&args),
        Command::Resolve(args) => run_resolve(&args),
    }
}

fn run_demo(args: &DemoArgs) -> Result<(), RouteError> {
    let config = args.config()?;
    log::info!("config: {:?}", config);

    let source = args.source.open(true);
    let mut stdout = io::stdout().lock();
    let summary = demo::run_demo(
        &config,
        &args.plan(),
        source,
        &mut stdout,
        &SHUTDOWN_REQUESTED,
    )?;
    stdout.flush().map_err(RouteError::Output)?;

    eprintln!(
        "{} lookups ({} hits, {} not found) across generations {:?}; watcher: {} installs, {} failed reloads",
        summary.lookups,
        summary.hits,
        summary.misses,
        summary.generations_seen,
        summary.watcher.installs,
        summary.watcher.failures
    );
    Ok(())
}

fn run_resolve(args: &ResolveArgs) -> Result<(), RouteError> {
    let loader = TableLoader::new(args.source.open(false));
    let registry = Arc::new(RouteTableRegistry::new(loader.load()?));
    let resolver = Resolver::new(registry);

    let results: Vec<_> = args
        .keys
        .iter()
        .enumerate()
        .map(|(i, key)| resolver.resolve_tagged(i as u64, key))
        .collect();

    let mut stdout = io::stdout().lock();
    output::write_resolutions(&results, args.format, &mut stdout)?;
    stdout.flush().map_err(RouteError::Output)
}
