//! Crash during delivery: a signal is durably appended with status NEW
//! but the process exits before a webhook accepted it. On restart, the
//! signal store still reports it via `list_new`, and a fresh
//! DeliveryDispatcher built against the same durable store delivers it
//! exactly once more, with the original id preserved (at-least-once).

use async_trait::async_trait;
use fx_signal_engine::application::delivery::channel::{DeliveryChannel, DeliveryResponse, TransportError};
use fx_signal_engine::application::delivery::payload::SignalPayload;
use fx_signal_engine::application::delivery::DeliveryDispatcher;
use fx_signal_engine::domain::repositories::{AppendOutcome, SignalStore};
use fx_signal_engine::domain::trading::{Direction, Signal, SignalStatus};
use fx_signal_engine::infrastructure::persistence::repositories::{
    SqliteDeliveryAttemptRepository, SqliteSignalStore,
};
use fx_signal_engine::infrastructure::persistence::Database;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

fn pending_signal() -> Signal {
    let now = chrono::Utc::now();
    Signal {
        id: uuid::Uuid::new_v4(),
        strategy_id: "dual_sma_10_20".into(),
        instrument: "EUR_USD".into(),
        timeframe: fx_signal_engine::domain::market::Timeframe::H4,
        direction: Direction::Long,
        entry_price: dec!(1.0825),
        stop_loss: dec!(1.0807),
        take_profit: dec!(1.0861),
        atr_at_signal: dec!(0.0012),
        emergency_level_at_signal: 0,
        position_size_multiplier: dec!(1.0),
        created_at: now,
        bar_open_time: now,
        fingerprint: 42,
        status: SignalStatus::New,
    }
}

struct AcceptingChannel {
    calls: Arc<AsyncMutex<Vec<uuid::Uuid>>>,
}

#[async_trait]
impl DeliveryChannel for AcceptingChannel {
    fn id(&self) -> &str {
        "webhook-1"
    }

    async fn post(&self, payload: &SignalPayload) -> Result<DeliveryResponse, TransportError> {
        self.calls.lock().await.push(payload.id);
        Ok(DeliveryResponse { status: 200, retry_after: None })
    }
}

#[tokio::test]
async fn signal_left_new_after_crash_is_delivered_on_restart() {
    let db_path = std::env::temp_dir().join(format!("fxsig_restart_{}.db", uuid::Uuid::new_v4()));
    let db_url = format!("sqlite://{}", db_path.display());

    let signal = pending_signal();

    // First "process": append the signal, then crash before delivery.
    {
        let database = Database::new(&db_url).await.unwrap();
        let store = SqliteSignalStore::new(database);
        let outcome = store.append(&signal).await.unwrap();
        assert_eq!(outcome, AppendOutcome::Inserted);
    }

    // Second "process": a fresh Database/SignalStore/DeliveryDispatcher
    // against the same file picks the signal back up.
    {
        let database = Database::new(&db_url).await.unwrap();
        let store = Arc::new(SqliteSignalStore::new(database.clone()));
        let attempts = Arc::new(SqliteDeliveryAttemptRepository::new(database));

        let pending = store.list_new().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, signal.id, "restart must recover the exact same signal id");

        let calls = Arc::new(AsyncMutex::new(Vec::new()));
        let channel = Arc::new(AcceptingChannel { calls: calls.clone() });
        let dispatcher = DeliveryDispatcher::new(vec![channel], attempts, store.clone(), 8, 4);

        for signal in &pending {
            dispatcher.dispatch(signal).await;
        }

        let delivered = calls.lock().await.clone();
        assert_eq!(delivered, vec![signal.id]);

        let remaining_new = store.list_new().await.unwrap();
        assert!(remaining_new.is_empty(), "delivered signal must no longer read back as NEW");
    }

    let _ = std::fs::remove_file(&db_path);
}
