//! Ritual engine: per-day completion of bedtime and morning steps
//!
//! Per (date, scope):
//!
//! ```text
//! NotStarted ──complete──► InProgress ──complete last──► Complete
//!      ▲                        │                           │
//!      └────────── reset ───────┴───────────────────────────┘
//! ```
//!
//! Completion is idempotent; there is no single-step undo. Finishing the
//! evening ritual fires the sleep scene without waiting for it.

mod steps;

pub use steps::{active_steps, active_steps_for, EveningStep, MorningStep, Scope, StepId};

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{HubError, HubResult};
use crate::integrations::HomeEffects;
use crate::store::{call_blocking, Store};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RitualStatus {
    pub date: String,
    pub completed_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub completed_steps: Vec<String>,
    pub all_done: bool,
}

/// Parse a wire step name, optionally requiring a scope.
pub fn parse_step(step: &str, scope: Option<Scope>) -> HubResult<StepId> {
    let parsed = StepId::parse(step).ok_or_else(|| HubError::invalid("Invalid step"))?;
    match scope {
        Some(s) if parsed.scope() != s => Err(HubError::invalid(format!("Invalid step for {} ritual", s.as_str()))),
        _ => Ok(parsed),
    }
}

pub struct RitualEngine {
    store: Arc<Store>,
    effects: Arc<dyn HomeEffects>,
}

impl RitualEngine {
    pub fn new(store: Arc<Store>, effects: Arc<dyn HomeEffects>) -> Self { Self { store, effects } }

    async fn steps_on(&self, date: &str) -> HubResult<Vec<String>> {
        let date = date.to_string();
        let rows = call_blocking(self.store.clone(), move |s| s.ritual_status(&date)).await?;
        let mut steps: Vec<String> = Vec::with_capacity(rows.len());
        for row in rows {
            if !steps.contains(&row.step) {
                steps.push(row.step);
            }
        }
        Ok(steps)
    }

    /// Every distinct step completed on `date`, both scopes.
    pub async fn status(&self, date: &str) -> HubResult<RitualStatus> {
        Ok(RitualStatus { date: date.to_string(), completed_steps: self.steps_on(date).await? })
    }

    /// Distinct steps of one scope completed on `date`.
    pub async fn scope_status(&self, date: &str, scope: Scope) -> HubResult<RitualStatus> {
        let steps = self.steps_on(date).await?
            .into_iter()
            .filter(|s| StepId::parse(s).is_some_and(|id| id.scope() == scope))
            .collect();
        Ok(RitualStatus { date: date.to_string(), completed_steps: steps })
    }

    /// Validate and complete a wire step name.
    pub async fn complete_step(&self, date: &str, step: &str, total: Option<usize>) -> HubResult<Completion> {
        let step = parse_step(step, None)?;
        self.complete(date, step, total).await
    }

    /// Record `step` for `date`. `total` is the number of steps that make the
    /// scope complete; when absent, today's active steps for the scope decide.
    pub async fn complete(&self, date: &str, step: StepId, total: Option<usize>) -> HubResult<Completion> {
        let scope = step.scope();
        let (owned_date, name) = (date.to_string(), step.as_str());
        let (_, created) = call_blocking(self.store.clone(), move |s| s.complete_step(&owned_date, name)).await?;

        let completed_steps = self.scope_status(date, scope).await?.completed_steps;
        let total = total.unwrap_or_else(|| active_steps_for(scope, date).len());
        let all_done = completed_steps.len() == total;
        debug!(date, step = name, created, done = completed_steps.len(), total, "ritual step completed");

        if created && all_done {
            info!(date, scope = scope.as_str(), "ritual complete");
            if scope == Scope::Evening {
                self.fire_sleep_mode();
            }
        }
        Ok(Completion { completed_steps, all_done })
    }

    /// Clear every completion of `scope` on `date`.
    pub async fn reset(&self, date: &str, scope: Scope) -> HubResult<usize> {
        let date = date.to_string();
        let names: Vec<&'static str> = scope.steps().iter().map(|s| s.as_str()).collect();
        let removed = call_blocking(self.store.clone(), move |s| s.delete_steps(&date, &names)).await?;
        info!(scope = scope.as_str(), removed, "ritual reset");
        Ok(removed)
    }

    /// Manual override; waits for the controller's answer.
    pub async fn trigger_sleep_mode(&self) -> bool {
        self.effects.trigger_sleep_mode().await
    }

    fn fire_sleep_mode(&self) {
        let effects = self.effects.clone();
        tokio::spawn(async move {
            if !effects.trigger_sleep_mode().await {
                warn!("sleep mode scene was not activated");
            }
        });
    }
}
