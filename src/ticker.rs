use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::engine::{Engine, EngineError};
use crate::model::VacancyCounts;
use crate::observability;
use crate::policy::Actor;
use crate::time::{self, Day, TimeOfDay};

/// Recompute campus vacancy for one slot and publish it to the gauges.
pub async fn refresh_at(engine: &Engine, day: Day, at: TimeOfDay) -> Result<VacancyCounts, EngineError> {
    let counts = engine.vacancy_counts(&Actor::system(), day, at).await?;
    observability::record_vacancy(&counts);
    debug!(
        %day,
        %at,
        vacant = counts.vacant,
        occupied = counts.occupied,
        total = counts.total,
        "vacancy refreshed"
    );
    Ok(counts)
}

/// Background task that keeps the vacancy gauges in step with the wall clock.
pub async fn run_ticker(engine: Arc<Engine>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let (_, day, at) = time::now_slot();
        if let Err(e) = refresh_at(&engine, day, at).await {
            warn!("vacancy refresh failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;

    #[tokio::test]
    async fn refresh_counts_demo_campus() {
        let engine = Engine::default();
        seed::apply(&engine, seed::demo().unwrap()).await.unwrap();

        let at = TimeOfDay::hm(9, 30).unwrap();
        let counts = refresh_at(&engine, Day::Monday, at).await.unwrap();
        assert_eq!(counts.total, 6);
        assert_eq!(counts.occupied, 1);
        assert_eq!(counts.vacant, 5);

        let sunday = refresh_at(&engine, Day::Sunday, at).await.unwrap();
        assert_eq!(sunday.occupied, 0);
    }

    #[tokio::test]
    async fn ticker_keeps_running() {
        let engine = Arc::new(Engine::default());
        let handle = tokio::spawn(run_ticker(engine, Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        handle.abort();
    }
}
