//! Infrastructure wiring: store + bus + clock → fulfillment engine.

use std::sync::Arc;

use bloodbank_events::{EventBus, InMemoryEventBus, Subscription};
use bloodbank_infra::{
    BloodBankEnvelope, Clock, EngineConfig, FulfillmentEngine, InMemoryBloodBankStore, SystemClock,
};

pub type Bus = Arc<InMemoryEventBus<BloodBankEnvelope>>;
pub type Engine = FulfillmentEngine<Arc<InMemoryBloodBankStore>, Bus>;

/// Shared state handed to every handler.
pub struct AppServices {
    engine: Engine,
}

impl AppServices {
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

pub fn build_services(config: EngineConfig) -> AppServices {
    build_services_with_clock(config, Arc::new(SystemClock))
}

/// In-memory wiring with a caller-supplied clock (tests drive time through it).
pub fn build_services_with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> AppServices {
    let store = Arc::new(InMemoryBloodBankStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    spawn_audit_log(bus.subscribe());

    AppServices {
        engine: FulfillmentEngine::new(store, bus, clock, config),
    }
}

/// Background subscriber: bus → structured audit log.
///
/// Exits once the bus (and with it every sender) is dropped.
fn spawn_audit_log(sub: Subscription<BloodBankEnvelope>) {
    let spawned = std::thread::Builder::new()
        .name("bloodbank-audit".to_string())
        .spawn(move || {
            while let Ok(env) = sub.recv() {
                tracing::info!(
                    event_id = %env.event_id(),
                    event_type = env.event_type(),
                    aggregate_type = env.aggregate_type(),
                    aggregate_id = %env.aggregate_id(),
                    occurred_at = %env.occurred_at(),
                    "event committed"
                );
            }
        });

    if let Err(e) = spawned {
        tracing::warn!("audit log subscriber not started: {e}");
    }
}
