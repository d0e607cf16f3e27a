//! Startline - launches a server process and reports when it is ready.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use startline::config::{ConfigResolver, ProcessConfig, Product, SystemEnv};
use startline::display;
use startline::install::{LogProgressReporter, PluginTool, RemovePluginsTask};
use startline::supervisor::ServerSupervisor;

/// Arguments naming the server installation to operate on.
#[derive(Args, Debug)]
struct TargetArgs {
    /// Server product, e.g. "kibana".
    product: String,

    /// Installation home directory (overrides <PRODUCT>_HOME).
    #[arg(long)]
    home: Option<PathBuf>,

    /// Configuration directory (overrides <PRODUCT>_CONFIG).
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Extra arguments passed through to the server process.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[derive(Parser)]
#[command(
    name = "startline",
    about = "Launches a server process and reports when it is ready",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the server and wait until it reports ready.
    Run {
        #[command(flatten)]
        target: TargetArgs,

        /// Seconds to wait for the readiness confirmation.
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },
    /// Remove every installed plugin using the product's plugin tool.
    RemovePlugins {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Print the resolved launch configuration.
    ShowConfig {
        #[command(flatten)]
        target: TargetArgs,
    },
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn resolver_for(target: &TargetArgs) -> ConfigResolver {
    let mut resolver =
        ConfigResolver::new(Product::new(target.product.as_str())).args(target.args.clone());
    if let Some(home) = &target.home {
        resolver = resolver.home_dir(home);
    }
    if let Some(config_dir) = &target.config_dir {
        resolver = resolver.config_dir(config_dir);
    }
    resolver
}

async fn run(target: TargetArgs, timeout: Duration) -> i32 {
    let config = match resolver_for(&target).resolve(&SystemEnv) {
        Ok(config) => config,
        Err(e) => {
            display::print_error(&e.to_string());
            return 1;
        }
    };

    display::print_launch(
        config.product.name(),
        &config.executable.display().to_string(),
    );
    let supervisor = ServerSupervisor::new(config);
    if let Err(e) = supervisor.start() {
        display::print_error(&e.to_string());
        return 1;
    }

    match supervisor.wait_until_ready(timeout).await {
        Ok(address) => display::print_ready(&address.host, address.port),
        Err(e) => {
            display::print_error(&e.to_string());
            supervisor.shutdown().await;
            return 1;
        }
    }

    // Keep streaming server output until the operator interrupts
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
    }
    display::print_stopping();
    supervisor.shutdown().await;
    0
}

async fn remove_plugins(target: TargetArgs) -> i32 {
    let (home_dir, config_dir) = resolver_for(&target).resolve_dirs(&SystemEnv);
    let product = Product::new(target.product.as_str());

    let reporter = Arc::new(LogProgressReporter);
    let manager = PluginTool::new(product.clone(), reporter.clone());
    let task = RemovePluginsTask::new(product, home_dir, config_dir);

    match task.execute(&manager, reporter.as_ref()).await {
        Ok(count) => {
            tracing::info!(count, "Plugin removal finished");
            0
        }
        Err(e) => {
            display::print_error(&e.to_string());
            1
        }
    }
}

fn show_config(target: &TargetArgs) -> i32 {
    match resolver_for(target).resolve(&SystemEnv) {
        Ok(config) => {
            print_config(&config);
            0
        }
        Err(e) => {
            display::print_error(&e.to_string());
            1
        }
    }
}

fn print_config(config: &ProcessConfig) {
    println!("product:      {}", config.product.name());
    println!("home:         {}", config.home_dir.display());
    println!("config dir:   {}", config.config_dir.display());
    println!("config file:  {}", config.config_file.display());
    println!("executable:   {}", config.executable.display());
    println!("entry script: {}", config.entry_script.display());
    println!("log dest:     {}", config.log_destination);
    if !config.extra_args.is_empty() {
        println!("extra args:   {}", config.extra_args.join(" "));
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = match cli.command {
        Commands::Run { target, timeout } => run(target, Duration::from_secs(timeout)).await,
        Commands::RemovePlugins { target } => remove_plugins(target).await,
        Commands::ShowConfig { target } => show_config(&target),
    };
    std::process::exit(code);
}
