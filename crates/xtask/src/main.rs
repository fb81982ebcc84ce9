//! Project automation for the orbital simulator.
//!
//! `cargo xtask kernels` downloads the SPICE kernels, `cargo xtask env`
//! rebuilds the Python environment used by the asset scripts, and
//! `cargo xtask run [FILE]` runs whatever target FILE belongs to.

mod console;
mod context;
mod dispatch;

use std::path::PathBuf;
use std::process::exit;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use kernel_fetch::{
    fetch_all, list_kernels, FetchOptions, FetchPolicy, HttpTransport, KernelGroup, LogReporter,
    Manifest, Transport,
};
use log::info;
use sim_env::{detect_backend, rebuild_environment};

use crate::console::{print_listing, ConsoleHandler, ConsoleReporter};
use crate::context::ProjectContext;

#[derive(Parser, Debug)]
#[command(name = "xtask")]
#[command(about = "Kernel provisioning, Python environment and run dispatch")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root (default: current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download SPICE kernels into assets/spice
    Kernels {
        /// Also fetch the satellite ephemerides
        #[arg(long)]
        extended: bool,

        /// Manifest file to use instead of the built-in one
        #[arg(long)]
        manifest: Option<PathBuf>,

        /// Destination directory (default: assets/spice)
        #[arg(long)]
        dest: Option<PathBuf>,

        /// Keep fetching after a failure and report all failures at the end
        #[arg(long)]
        keep_going: bool,

        /// Print the fetch report as JSON instead of status lines
        #[arg(long)]
        json: bool,

        /// Only list the kernels already present
        #[arg(long)]
        list: bool,
    },

    /// Delete and recreate the Python environment, then install packages
    Env {
        /// Environment directory (default: .venv)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Packages to install (default: [env] packages in xtask.toml, else numpy pillow)
        packages: Vec<String>,
    },

    /// Run the example FILE belongs to, or the main binary
    Run {
        /// Source file currently being edited
        file: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    let ctx = ProjectContext::new(cli.root).context("Failed to determine project root")?;

    match cli.command {
        Commands::Kernels {
            extended,
            manifest,
            dest,
            keep_going,
            json,
            list,
        } => {
            let options = KernelsArgs {
                extended,
                manifest,
                dest,
                keep_going,
                json,
                list,
            };
            cmd_kernels(&ctx, options).await
        }
        Commands::Env { path, packages } => cmd_env(&ctx, path, packages).await,
        Commands::Run { file } => {
            let argv: Vec<String> = file.into_iter().collect();
            let code = cmd_run(&ctx, &argv)?;
            exit(code);
        }
    }
}

#[derive(Default)]
struct KernelsArgs {
    extended: bool,
    manifest: Option<PathBuf>,
    dest: Option<PathBuf>,
    keep_going: bool,
    json: bool,
    list: bool,
}

async fn cmd_kernels(ctx: &ProjectContext, args: KernelsArgs) -> anyhow::Result<()> {
    let transport = HttpTransport::new(FetchOptions::default())?;
    provision_kernels(ctx, args, &transport).await
}

async fn provision_kernels<T: Transport>(
    ctx: &ProjectContext,
    args: KernelsArgs,
    transport: &T,
) -> anyhow::Result<()> {
    let dest = match args.dest {
        Some(dest) => ctx.resolve(&dest),
        None => ctx.assets_dir(),
    };

    if args.list {
        let files = list_kernels(&dest)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&files)?);
        } else {
            print_listing(&files);
        }
        return Ok(());
    }

    let manifest = match &args.manifest {
        Some(path) => Manifest::load(&ctx.resolve(path))
            .with_context(|| format!("Failed to load manifest {}", path.display()))?,
        None => Manifest::builtin()?,
    };
    let groups: &[KernelGroup] = if args.extended {
        &[KernelGroup::Core, KernelGroup::Satellites]
    } else {
        &[KernelGroup::Core]
    };
    let manifest = manifest.filtered(groups);

    info!(
        "Fetching {} kernels from {} into {:?}",
        manifest.len(),
        manifest.base_url(),
        dest
    );

    let policy = if args.keep_going {
        FetchPolicy::BestEffort
    } else {
        FetchPolicy::FailFast
    };
    let report = if args.json {
        fetch_all(&manifest, &dest, transport, policy, &LogReporter).await?
    } else {
        fetch_all(&manifest, &dest, transport, policy, &ConsoleReporter).await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_listing(&list_kernels(&dest)?);
    }

    if !report.is_success() {
        let failed: Vec<&str> = report
            .failed()
            .map(|o| o.local_filename.as_str())
            .collect();
        bail!("{} kernel(s) failed: {}", failed.len(), failed.join(", "));
    }

    Ok(())
}

async fn cmd_env(
    ctx: &ProjectContext,
    path: Option<PathBuf>,
    packages: Vec<String>,
) -> anyhow::Result<()> {
    let mut spec = ctx.load_config()?.env;
    if let Some(path) = path {
        spec.path = path;
    }
    if !packages.is_empty() {
        spec.packages = packages;
    }

    let env_path = spec.env_path_in(ctx.root());
    let backend = detect_backend().await?;
    let env = rebuild_environment(&env_path, &spec.packages, &backend, &ConsoleHandler).await?;

    println!(
        "Installed {} into {}",
        spec.packages.join(", "),
        env.env_path.display()
    );
    Ok(())
}

fn cmd_run(ctx: &ProjectContext, argv: &[String]) -> anyhow::Result<i32> {
    let invocation = dispatch::select_command(argv);
    let code = dispatch::run_invocation(&invocation, ctx.root())?;
    Ok(code)
}
