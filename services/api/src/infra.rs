use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use valuation::engine::{HdbValuationPipeline, PrivateValuationPipeline};
use valuation::store::{HdbHealth, ModelStore, PrivateHealth};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Both domain pipelines plus their dependency health, built once from
/// the model store at startup and shared read-only across requests.
pub(crate) struct ValuationEngines {
    pub(crate) hdb: HdbValuationPipeline,
    pub(crate) private: PrivateValuationPipeline,
    pub(crate) hdb_health: HdbHealth,
    pub(crate) private_health: PrivateHealth,
}

impl ValuationEngines {
    pub(crate) fn from_store(store: &ModelStore) -> Self {
        Self {
            hdb: store.hdb_pipeline(),
            private: store.private_pipeline(),
            hdb_health: store.hdb_health(),
            private_health: store.private_health(),
        }
    }
}
