// chain - command line front end for the custody ledger

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use supplychain::engine::{
    EngineConfig, TransferEngine, TransferError, TransferKind, TransferRequest,
};
use supplychain::events::{EmitterConfig, EventEmitter, LogSubscriber};
use supplychain::model::{ContractId, Measurement, PackageId, ParticipantId, Role};
use supplychain::registry::{demo_network, Registry};
use supplychain::sensor::{IngestConfig, SensorIngestor};
use supplychain::storage::SledLedger;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chain", version, about = "Supply-chain custody ledger")]
struct Cli {
    /// Directory of the ledger database
    #[arg(long, default_value = "./chain-data")]
    data_dir: PathBuf,

    /// Retries after a version conflict before a command gives up
    #[arg(long, default_value_t = 5)]
    max_retries: u32,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Onboard the sample participants and package BAT_0001
    Bootstrap,
    /// Manufacturer hands a package to a shipper
    Ship(TransferArgs),
    /// Shipper hands a package to a wholesaleperson
    Wholesale(TransferArgs),
    /// Wholesaleperson hands a package to a retailer
    Retail(TransferArgs),
    /// Record a sensor reading for a package
    #[command(subcommand)]
    Reading(ReadingCommand),
    /// Print one record
    #[command(subcommand)]
    Show(ShowCommand),
    /// Print every participant, package and contract
    List,
}

#[derive(Args)]
struct TransferArgs {
    #[arg(long)]
    package: String,
    /// Current owner
    #[arg(long)]
    from: String,
    /// New owner
    #[arg(long)]
    to: String,
    /// Settle at this amount instead of the package face value
    #[arg(long)]
    face_value: Option<u64>,
    /// Wholesaleperson to name on the contract (ship only)
    #[arg(long)]
    wholesaler: Option<String>,
    /// Retailer to name on the contract (ship only)
    #[arg(long)]
    retailer: Option<String>,
}

#[derive(Subcommand)]
enum ReadingCommand {
    Temperature {
        #[arg(long)]
        package: String,
        #[arg(allow_negative_numbers = true)]
        celsius: f64,
    },
    Humidity {
        #[arg(long)]
        package: String,
        percent: f64,
    },
    Location {
        #[arg(long)]
        package: String,
        coordinate: String,
    },
}

#[derive(Subcommand)]
enum ShowCommand {
    Package { id: String },
    Participant { id: String },
    Contract { id: String },
    History { package: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let store = Arc::new(SledLedger::open(&cli.data_dir)?);

    let emitter_config = EmitterConfig::default();
    emitter_config.validate()?;
    let (mut emitter, queue) = EventEmitter::new(emitter_config);
    emitter.subscribe(Arc::new(LogSubscriber));

    let engine_config = EngineConfig::new().with_max_retries(cli.max_retries);
    engine_config.validate()?;
    // Engine and ingestor block on sled and sleep between conflict retries,
    // so their calls run on the blocking pool
    let engine = Arc::new(TransferEngine::with_config(store.clone(), queue, engine_config));
    let ingestor = Arc::new(SensorIngestor::with_config(
        store.clone(),
        IngestConfig::new().with_max_retries(cli.max_retries),
    ));
    let registry = Registry::new(store.clone());

    match cli.command {
        Command::Bootstrap => {
            let versions = registry.add_all(demo_network()?)?;
            println!("onboarded {} records", versions.len());
        }
        Command::Ship(args) => spawn_transfer(&engine, TransferKind::Ship, args).await?,
        Command::Wholesale(args) => spawn_transfer(&engine, TransferKind::Wholesale, args).await?,
        Command::Retail(args) => spawn_transfer(&engine, TransferKind::Retail, args).await?,
        Command::Reading(reading) => {
            let (package, measurement) = match reading {
                ReadingCommand::Temperature { package, celsius } => {
                    (package, Measurement::Temperature(celsius))
                }
                ReadingCommand::Humidity { package, percent } => {
                    (package, Measurement::Humidity(percent))
                }
                ReadingCommand::Location {
                    package,
                    coordinate,
                } => (package, Measurement::Location(coordinate)),
            };
            let recorder = ingestor.clone();
            let recorded = tokio::task::spawn_blocking(move || {
                recorder.record(&PackageId::new(package), measurement, Utc::now())
            })
            .await??;
            println!("reading #{} stored (history v{})", recorded.index, recorded.version);
        }
        Command::Show(target) => match target {
            ShowCommand::Package { id } => {
                let found = registry.package(&PackageId::new(id))?;
                let p = &found.record;
                println!(
                    "{} v{}: owner={} face_value={} units={} mean_temp={} shipment={}",
                    p.id(),
                    found.version,
                    p.owner(),
                    p.face_value(),
                    p.unit_count(),
                    p.mean_temperature(),
                    p.shipment_id()
                );
            }
            ShowCommand::Participant { id } => {
                let found = registry.participant(&ParticipantId::new(id))?;
                let p = &found.record;
                println!(
                    "{} v{}: {} {} {} wallet={}",
                    p.id(),
                    found.version,
                    p.role(),
                    p.first_name(),
                    p.last_name(),
                    p.wallet()
                );
            }
            ShowCommand::Contract { id } => {
                let found = registry.contract(&ContractId::new(id))?;
                let c = &found.record;
                println!(
                    "{} v{}: package={} status={} started={}",
                    c.id(),
                    found.version,
                    c.package(),
                    c.status(),
                    c.start_time()
                );
            }
            ShowCommand::History { package } => {
                let history = ingestor.history(&PackageId::new(package))?;
                for (i, reading) in history.readings().iter().enumerate() {
                    println!(
                        "#{} {} {} {}",
                        i,
                        reading.timestamp(),
                        reading.kind(),
                        reading.measurement()
                    );
                }
            }
        },
        Command::List => {
            for role in Role::ALL {
                for p in registry.participants(Some(role))? {
                    println!("{:<16} {:<10} wallet={}", role.to_string(), p.id(), p.wallet());
                }
            }
            for p in registry.packages()? {
                println!("package          {:<10} owner={}", p.id(), p.owner());
            }
            for c in registry.contracts()? {
                println!("contract         {:<14} status={}", c.id(), c.status());
            }
        }
    }

    store.flush()?;

    // Dropping the last engine handle closes the queue; the emitter then
    // finishes what is left.
    drop(engine);
    let emitter = emitter.run().await;
    for letter in emitter.dead_letters() {
        warn!(
            subscriber = %letter.subscriber,
            package = %letter.event.package(),
            "event not delivered: {}",
            letter.error
        );
    }

    Ok(())
}

async fn spawn_transfer(
    engine: &Arc<TransferEngine<SledLedger>>,
    kind: TransferKind,
    args: TransferArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = engine.clone();
    tokio::task::spawn_blocking(move || run_transfer(&engine, kind, args)).await??;
    Ok(())
}

fn run_transfer(
    engine: &TransferEngine<SledLedger>,
    kind: TransferKind,
    args: TransferArgs,
) -> Result<(), TransferError> {
    let mut request = TransferRequest::new(
        kind,
        PackageId::new(args.package),
        ParticipantId::new(args.from),
        ParticipantId::new(args.to),
    );
    if let Some(face_value) = args.face_value {
        request = request.with_face_value(face_value);
    }
    if let Some(w) = args.wholesaler.as_deref() {
        request = request.with_wholesaleperson(w);
    }
    if let Some(r) = args.retailer.as_deref() {
        request = request.with_retailer(r);
    }

    let receipt = engine.transfer(&request)?;
    let event = receipt.event();
    println!(
        "{} {} -> {}: contract {} now {} (seller wallet {}, buyer wallet {})",
        event.package(),
        event.old_owner(),
        event.new_owner(),
        event.contract(),
        event.status(),
        receipt.seller_wallet(),
        receipt.buyer_wallet()
    );
    Ok(())
}
