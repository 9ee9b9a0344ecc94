//! Persistence service — debounced write-behind of document snapshots.
//!
//! DESIGN
//! ======
//! Every accepted mutation bumps the document's save generation and spawns
//! a debounce task carrying that generation. When the timer fires, the task
//! saves only if its generation is still current — a newer mutation has
//! started a newer task and this one stands down. The effect is a
//! cancel-and-reschedule timer per document with an explicit owner, and
//! disk writes that never block the relay loop.
//!
//! ERROR HANDLING
//! ==============
//! The dirty flag is cleared only after a successful write. A failed write
//! leaves it set and the task sleeps another debounce interval and retries,
//! so a transient disk error delays durability instead of losing edits.

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;

use tracing::{error, warn};

use crate::state::AppState;

/// Outcome of one save attempt, driving the debounce loop.
enum Attempt {
    Saved,
    /// A newer mutation owns the schedule now, or the document is gone.
    Superseded,
    Failed,
}

/// Mark a document dirty and (re)start its debounce timer.
pub async fn schedule_save(state: &AppState, name: &str) {
    let generation = {
        let mut docs = state.docs.write().await;
        let Some(doc) = docs.get_mut(name) else {
            return;
        };
        doc.dirty = true;
        doc.save_generation += 1;
        doc.save_generation
    };

    let state = state.clone();
    let name = name.to_string();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(state.save_debounce).await;
            match try_save(&state, &name, Some(generation)).await {
                Attempt::Saved | Attempt::Superseded => break,
                Attempt::Failed => {
                    // Stay alive and retry on the next debounce cycle.
                }
            }
        }
    });
}

/// Synchronously flush every dirty document. Called once on shutdown.
pub async fn flush_all(state: &AppState) {
    let names: Vec<String> = state.docs.read().await.keys().cloned().collect();
    for name in names {
        if let Attempt::Failed = try_save(state, &name, None).await {
            error!(doc = %name, "final flush failed, snapshot may be stale");
        }
    }
}

/// Serialize and write one document's snapshot. With `generation: Some`,
/// stands down when a newer mutation has superseded this schedule.
async fn try_save(state: &AppState, name: &str, generation: Option<u64>) -> Attempt {
    let bytes = {
        let docs = state.docs.read().await;
        let Some(doc) = docs.get(name) else {
            return Attempt::Superseded;
        };
        if !doc.dirty {
            return Attempt::Superseded;
        }
        if generation.is_some_and(|g| g != doc.save_generation) {
            return Attempt::Superseded;
        }
        match doc.replica.snapshot() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(doc = name, error = %e, "snapshot encode failed");
                return Attempt::Failed;
            }
        }
    };

    if let Err(e) = state.store.save(name, &bytes).await {
        warn!(doc = name, error = %e, "snapshot save failed, will retry");
        return Attempt::Failed;
    }

    let mut docs = state.docs.write().await;
    if let Some(doc) = docs.get_mut(name) {
        // Only clear dirty if no mutation landed while we were writing.
        if generation.is_none_or(|g| g == doc.save_generation) {
            doc.dirty = false;
        }
    }
    Attempt::Saved
}
