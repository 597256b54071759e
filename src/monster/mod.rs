//! Monster scanner: logs every scan and flashes the bedroom light.
//!
//! The result is always "no monsters".

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::HubResult;
use crate::integrations::HomeEffects;
use crate::store::{call_blocking, MonsterScan, Store, NO_MONSTERS};

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutcome {
    pub scan_id: i64,
    pub monsters_found: bool,
}

/// `limit` query value; missing, non-numeric or non-positive means the default.
pub fn parse_limit(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
}

pub struct MonsterLog {
    store: Arc<Store>,
    effects: Arc<dyn HomeEffects>,
}

impl MonsterLog {
    pub fn new(store: Arc<Store>, effects: Arc<dyn HomeEffects>) -> Self { Self { store, effects } }

    pub async fn perform_scan(&self) -> HubResult<ScanOutcome> {
        let effects = self.effects.clone();
        tokio::spawn(async move {
            if !effects.trigger_monster_scan_effect().await {
                warn!("monster scan light effect did not run");
            }
        });

        let scan = call_blocking(self.store.clone(), |s| s.create_monster_scan(NO_MONSTERS)).await?;
        info!(scan_id = scan.id, "monster scan recorded");
        Ok(ScanOutcome { scan_id: scan.id, monsters_found: false })
    }

    /// Newest first.
    pub async fn history(&self, limit: usize) -> HubResult<Vec<MonsterScan>> {
        call_blocking(self.store.clone(), move |s| s.monster_scan_history(limit)).await
    }
}
