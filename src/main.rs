//! CLI for msgrelay
//!
//! Subcommands:
//! - `serve`: run the HTTP API and the relay worker until SIGINT/SIGTERM
//! - `stats`: print message statistics from the configured store and exit

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use msgrelay::broker::{Broker, Consumer, Producer};
use msgrelay::config::{
    BrokerBackend, BrokerSettings, Settings, StoreBackend, StoreSettings, load_config,
    load_dotenv,
};
use msgrelay::persistence::{MemoryStore, MessageStore, SledStore};
use msgrelay::relay::{MessageService, RelayWorker, RetryPolicy};
use msgrelay::transport::{AppState, start_http_server};
use msgrelay::utils::error::BoxError;
use msgrelay::utils::shutdown::install_signal_handler;
use msgrelay::utils::{Error, logging};
use msgrelay::validation::MessageValidator;

#[derive(Parser)]
#[command(name = "msgrelay")]
enum Command {
    /// Run the HTTP API and the relay worker
    Serve,
    /// Print message statistics from the configured store
    Stats,
}

#[tokio::main]
async fn main() {
    let cmd = Command::parse();

    let dotenv = load_dotenv();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    logging::init(&settings.log.level);

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Failed to load .env.local"),
    }

    let result = match cmd {
        Command::Serve => serve(settings).await,
        Command::Stats => stats(settings).await,
    };

    if let Err(e) = result {
        error!("msgrelay failed: {}", e);
        std::process::exit(1);
    }
}

/// The store as the relay sees it, plus the sled handle to flush on exit.
struct StoreHandle {
    store: Arc<dyn MessageStore>,
    sled: Option<SledStore>,
}

fn open_store(settings: &StoreSettings, validator: MessageValidator) -> Result<StoreHandle, Error> {
    match settings.backend {
        StoreBackend::Sled => {
            info!(path = %settings.path, "Opening sled store");
            let sled = SledStore::open(&settings.path, validator)?;
            Ok(StoreHandle {
                store: Arc::new(sled.clone()),
                sled: Some(sled),
            })
        }
        StoreBackend::Memory => {
            warn!("Using in-memory store, records will not survive a restart");
            Ok(StoreHandle {
                store: Arc::new(MemoryStore::new(validator)),
                sled: None,
            })
        }
    }
}

/// Both broker facets, plus the in-process broker to close on exit.
struct BrokerHandle {
    producer: Arc<dyn Producer>,
    consumer: Arc<dyn Consumer>,
    local: Option<Arc<Broker>>,
}

fn connect_broker(settings: &BrokerSettings) -> Result<BrokerHandle, Error> {
    match settings.backend {
        BrokerBackend::Memory => {
            info!("Using in-process broker");
            let broker = Arc::new(Broker::new());
            Ok(BrokerHandle {
                producer: broker.clone(),
                consumer: broker.clone(),
                local: Some(broker),
            })
        }
        #[cfg(feature = "kafka")]
        BrokerBackend::Kafka => {
            use msgrelay::broker::kafka::{KafkaConsumer, KafkaProducer};

            Ok(BrokerHandle {
                producer: Arc::new(KafkaProducer::new(settings)?),
                consumer: Arc::new(KafkaConsumer::new(settings)?),
                local: None,
            })
        }
        #[cfg(not(feature = "kafka"))]
        BrokerBackend::Kafka => Err(Error::invalid_input(
            "connect broker",
            "broker.backend = kafka requires building with the `kafka` feature",
        )),
    }
}

async fn serve(settings: Settings) -> Result<(), BoxError> {
    let validator = MessageValidator::new(settings.store.max_content_length);
    let store = open_store(&settings.store, validator)?;
    let broker = connect_broker(&settings.broker)?;
    let shutdown = install_signal_handler();
    let channel = settings.broker.channel_name.clone();

    let worker = RelayWorker::new(
        store.store.clone(),
        broker.consumer.clone(),
        channel.clone(),
        RetryPolicy::from(&settings.relay),
        shutdown.clone(),
    );
    let worker = tokio::spawn(worker.run());

    let state = AppState {
        service: MessageService::new(store.store.clone(), broker.producer.clone(), channel),
        validator,
    };
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let served = start_http_server(&addr, state, shutdown.clone()).await;

    // The server may also exit on a bind or accept error.
    shutdown.cancel();
    if let Some(local) = &broker.local {
        local.close();
    }

    match worker.await {
        Ok(report) => info!(?report, "Relay worker stopped"),
        Err(e) => error!(error = %e, "Relay worker panicked"),
    }

    if let Some(sled) = &store.sled {
        sled.flush().await?;
    }

    served?;
    info!("Shutdown complete");
    Ok(())
}

async fn stats(settings: Settings) -> Result<(), BoxError> {
    let validator = MessageValidator::new(settings.store.max_content_length);
    let store = open_store(&settings.store, validator)?;
    let stats = store.store.statistics().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
