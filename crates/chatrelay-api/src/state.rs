//! Application state wiring all services together.
//!
//! Services are generic over the provider and ledger ports; AppState pins
//! them to the boxed infra implementations chosen by configuration.

use std::sync::Arc;

use chatrelay_core::chat::{ChatLogger, CompletionRelay};
use chatrelay_core::dashboard::DashboardService;
use chatrelay_core::ledger::{InMemoryLedger, LazyLedger};
use chatrelay_core::llm::box_provider::BoxCompletionProvider;
use chatrelay_core::llm::token_budget::HistoryWindower;
use chatrelay_core::llm::tokenizer::HeuristicTokenizer;
use chatrelay_core::supervisor::TaskSupervisor;
use chatrelay_core::usage::UsageLedger;
use chatrelay_infra::config::resolve_data_dir;
use chatrelay_infra::llm::create_provider;
use chatrelay_infra::sqlite::SqliteLedger;
use chatrelay_types::config::{LedgerBackend, RelayConfig};

pub type ConcreteRelay = CompletionRelay<BoxCompletionProvider>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<ConcreteRelay>,
    pub usage: Arc<UsageLedger>,
    pub dashboard: Arc<DashboardService>,
    pub ledger: Arc<LazyLedger>,
    pub supervisor: TaskSupervisor,
}

impl AppState {
    /// Wire services from configuration.
    ///
    /// The ledger is not opened here; the first request that needs it does so.
    pub fn init(config: RelayConfig) -> anyhow::Result<Self> {
        let provider = create_provider(&config.provider)?;

        let ledger = match config.ledger.backend {
            LedgerBackend::Sqlite => {
                let data_dir = resolve_data_dir(&config);
                tracing::info!(data_dir = %data_dir.display(), "using sqlite ledger");
                LazyLedger::new(
                    SqliteLedger::new(data_dir),
                    &config.ledger.database_id,
                    &config.ledger.container_id,
                )
            }
            LedgerBackend::Memory => {
                tracing::warn!("using in-memory ledger; chat logs and usage are lost on exit");
                LazyLedger::new(
                    InMemoryLedger::new(),
                    &config.ledger.database_id,
                    &config.ledger.container_id,
                )
            }
        };

        Ok(Self::from_parts(&config, provider, ledger))
    }

    pub fn from_parts(config: &RelayConfig, provider: BoxCompletionProvider, ledger: LazyLedger) -> Self {
        let ledger = Arc::new(ledger);
        let supervisor = TaskSupervisor::new();

        let windower = HistoryWindower::new(
            Arc::new(HeuristicTokenizer::default()),
            config.history.reserve_tokens,
        );
        let relay = CompletionRelay::new(
            provider,
            windower,
            ChatLogger::new(ledger.clone()),
            supervisor.clone(),
            config.system_prompt_or_default(),
        );

        Self {
            relay: Arc::new(relay),
            usage: Arc::new(UsageLedger::new(ledger.clone())),
            dashboard: Arc::new(DashboardService::new(ledger.clone())),
            ledger,
            supervisor,
        }
    }
}
