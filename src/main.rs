use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use clusterops::config::default_config_path;
use clusterops::{
    ClusterConfig, ClusterOp, ClusterTopology, Dispatcher, ExecutionContext, HttpTransport,
    HttpTransportConfig, LogStagingLimits, NmaHealthOp, NmaNodeStateOp, NmaStageErrorReportOp,
    NmaStageVerticaLogsOp, OpEngine, generate_scrutinize_id,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clusterops")]
#[command(about = "Run staged operations against the agents of a database cluster")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Stage error reports and server logs on every host for collection
    Scrutinize {
        #[command(flatten)]
        target: TargetArgs,
        /// Bytes of server log to stage per host, 0 for no limit
        #[arg(long, default_value_t = 0)]
        log_size_limit: i64,
    },
    /// Check that every host's agent answers
    Health {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Print the state each agent reports for its node
    NodeStates {
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the configuration file
    Show {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct TargetArgs {
    #[arg(long)]
    config: Option<PathBuf>,
    /// Comma-separated subset of hosts; all hosts when omitted
    #[arg(long, value_delimiter = ',')]
    hosts: Vec<String>,
    /// Agent port
    #[arg(long)]
    port: Option<u16>,
    /// Give up on hosts that have not answered after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Cli::parse()).await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Config {
            action: ConfigAction::Show { config },
        } => {
            let path = config.unwrap_or_else(default_config_path);
            print!("{}", ClusterConfig::show(&path)?);
            Ok(())
        }
        Command::Scrutinize {
            target,
            log_size_limit,
        } => scrutinize(&target, log_size_limit).await,
        Command::Health { target } => {
            let (mut ctx, hosts) = context_for(&target)?;
            let ops: Vec<Box<dyn ClusterOp>> = vec![Box::new(NmaHealthOp::new(hosts.clone()))];
            OpEngine::new(ops).run(&mut ctx).await?;
            println!("All {} hosts are healthy", hosts.len());
            Ok(())
        }
        Command::NodeStates { target } => {
            let (mut ctx, hosts) = context_for(&target)?;
            let ops: Vec<Box<dyn ClusterOp>> = vec![Box::new(NmaNodeStateOp::new(hosts))];
            OpEngine::new(ops).run(&mut ctx).await?;

            let states: BTreeMap<String, String> = ctx
                .node_states
                .iter()
                .map(|(host, state)| (host.clone(), state.to_string()))
                .collect();
            println!("{}", serde_json::to_string_pretty(&states)?);
            Ok(())
        }
    }
}

async fn scrutinize(target: &TargetArgs, log_size_limit: i64) -> Result<()> {
    let (mut ctx, hosts) = context_for(target)?;
    let id = generate_scrutinize_id();
    let limits = LogStagingLimits {
        size_limit_bytes: log_size_limit,
        ..LogStagingLimits::default()
    };

    let ops: Vec<Box<dyn ClusterOp>> = vec![
        Box::new(NmaStageErrorReportOp::from_topology(&id, &ctx.topology, &hosts)?),
        Box::new(NmaStageVerticaLogsOp::from_topology(
            &id,
            &ctx.topology,
            &hosts,
            limits,
        )?),
    ];
    OpEngine::new(ops).run(&mut ctx).await?;

    let staged: BTreeMap<_, _> = ctx.staged_files.iter().collect();
    println!("{}", serde_json::to_string_pretty(&staged)?);
    for (host, detail) in &ctx.failed_hosts {
        eprintln!("warning: {} skipped: {}", host, detail);
    }
    Ok(())
}

/// Loads the topology from the config file and builds a context targeting
/// `--hosts`, or every host when none are given.
fn context_for(target: &TargetArgs) -> Result<(ExecutionContext, Vec<String>)> {
    let path = target.config.clone().unwrap_or_else(default_config_path);
    let topology: ClusterTopology = ClusterConfig::read(&path)?
        .into_topology()
        .with_context(|| format!("Failed to load topology from '{}'", path.display()))?;

    let hosts = if target.hosts.is_empty() {
        topology.host_list().to_vec()
    } else {
        let (known, unknown) = topology.contain_nodes(&target.hosts);
        if !unknown.is_empty() {
            anyhow::bail!("hosts not in database {}: {}", topology.name, unknown.join(", "));
        }
        known
    };

    let mut transport_config = HttpTransportConfig::default();
    if let Some(port) = target.port {
        transport_config = transport_config.port(port);
    }
    let transport = HttpTransport::new(transport_config)?;
    let mut dispatcher = Dispatcher::new(Arc::new(transport));
    dispatcher.set_deadline(target.timeout_secs.map(Duration::from_secs));

    Ok((ExecutionContext::new(dispatcher, topology), hosts))
}
