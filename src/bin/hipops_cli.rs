use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use hipops::logging;
use hipops::ops::tensor_values_f64;
use hipops::{DeviceConfig, HipContext, Net, NetDef, OperatorRegistry, Workspace};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "hipops-cli", version)]
#[command(about = "Run HIP operators on the emulated ROCm device", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered operators and their device kinds
    List,
    /// Run a net described by a JSON file and print its outputs
    Run {
        /// Path to the net definition
        #[arg(long)]
        net: PathBuf,
        /// Device ordinal (overrides HIPOPS_DEVICE_ID)
        #[arg(long)]
        device_id: Option<i32>,
        /// GFX architecture name (overrides HIPOPS_ARCH)
        #[arg(long)]
        arch: Option<String>,
        /// Synchronize after every kernel launch
        #[arg(long)]
        debug_sync: bool,
        /// Print outputs as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct BlobReport {
    name: String,
    dtype: String,
    dims: Vec<usize>,
    values: Vec<f64>,
}

fn main() -> anyhow::Result<()> {
    logging::init_logging_default();
    let cli = Cli::parse();
    let registry = OperatorRegistry::with_hip_operators().context("registering operators")?;

    match cli.command {
        Commands::List => {
            for (op_type, device) in registry.registered_operators() {
                println!("{:<36}{}", op_type, device);
            }
        }
        Commands::Run {
            net,
            device_id,
            arch,
            debug_sync,
            json,
        } => {
            let text = std::fs::read_to_string(&net)
                .with_context(|| format!("reading net file {}", net.display()))?;
            let def: NetDef = serde_json::from_str(&text)
                .with_context(|| format!("parsing net file {}", net.display()))?;

            let mut config = DeviceConfig::from_env();
            if let Some(id) = device_id {
                config = config.with_device_id(id);
            }
            if let Some(arch) = arch {
                config = config.with_arch(arch);
            }
            if debug_sync {
                config = config.with_debug_sync_launch(true);
            }
            let context = Arc::new(HipContext::new(config).context("creating device context")?);

            let mut ws = Workspace::new();
            let mut net_instance = Net::new(&def, &registry, &mut ws, Arc::clone(&context))
                .with_context(|| format!("building net '{}'", def.name))?;
            net_instance
                .run()
                .with_context(|| format!("running net '{}'", def.name))?;

            let reports = def
                .outputs
                .iter()
                .map(|name| {
                    let tensor = ws.fetch_tensor(name)?;
                    Ok(BlobReport {
                        name: name.clone(),
                        dtype: tensor.dtype().to_string(),
                        dims: tensor.dims().to_vec(),
                        values: tensor_values_f64(&tensor)?,
                    })
                })
                .collect::<hipops::OpsResult<Vec<_>>>()
                .context("fetching outputs")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for report in &reports {
                    println!(
                        "{} {} {:?}: {:?}",
                        report.name, report.dtype, report.dims, report.values
                    );
                }
            }
            tracing::info!(
                kernels = context.stats().kernels_launched,
                skipped = context.stats().empty_launches_skipped,
                "net finished"
            );
        }
    }
    Ok(())
}
