// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-entity timers.
//!
//! Each entity type gets one task that waits `initialDelay`, then ticks
//! every `period` until shutdown. A tick never runs the pipeline itself:
//! it reads a fresh config snapshot and, if the entity is enabled, spawns
//! an invocation. Long waits inside a pipeline therefore never hold up
//! any timer.
//!
//! The delay and period are fixed when the timer is registered. The
//! `enabled` flag and batch size are read again at every tick.

use super::Launcher;
use crate::metrics;
use crate::model::{EntityType, TriggerSource};
use crate::transport::HttpTransport;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub(super) async fn run_timer<T: HttpTransport>(
    entity: EntityType,
    launcher: Launcher<T>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let schedule = launcher.snapshot().sync.schedule(entity);
    if let Some(cron) = &schedule.cron {
        warn!(
            entity = %entity,
            cron = %cron,
            period = %humantime::format_duration(schedule.period),
            "Calendar expressions are not evaluated, using the fixed period"
        );
    }

    let mut timer = interval_at(Instant::now() + schedule.initial_delay, schedule.period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        entity = %entity,
        initial_delay = %humantime::format_duration(schedule.initial_delay),
        period = %humantime::format_duration(schedule.period),
        "Timer registered"
    );

    loop {
        tokio::select! {
            biased;

            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    debug!(entity = %entity, "Timer stopping");
                    break;
                }
            }

            _ = timer.tick() => {
                let config = launcher.snapshot();
                if !config.sync.schedule(entity).enabled {
                    debug!(entity = %entity, "Sync disabled, tick skipped");
                    metrics::record_scheduler_tick(entity, false);
                    continue;
                }
                metrics::record_scheduler_tick(entity, true);
                launcher.launch(entity, TriggerSource::Scheduled, config).await;
            }
        }
    }

    info!(entity = %entity, "Timer stopped");
}
