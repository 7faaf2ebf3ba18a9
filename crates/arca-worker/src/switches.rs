use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::sleep;

/// How often the worker checks for pending activations.
const POLL_INTERVAL_MS: u64 = 100;

type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A registered switch handler. Receives the activation context (last one
/// wins when activations collapse).
pub type SwitchHandler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

#[derive(Default)]
struct State {
    handlers: HashMap<String, SwitchHandler>,
    /// Pending activations in arrival order. One entry per switch name;
    /// re-activation replaces the context in place.
    pending: Vec<(String, Value)>,
}

/// The switch bus. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct SwitchBus {
    state: Arc<Mutex<State>>,
    shutdown_tx: Arc<Mutex<Option<mpsc::Sender<()>>>>,
}

impl SwitchBus {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            shutdown_tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Register the handler for a switch name. Registration happens at
    /// startup; re-registering replaces the handler.
    pub fn register<F, Fut>(&self, name: &str, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: SwitchHandler = Arc::new(move |context| Box::pin(handler(context)));
        let mut state = self.state.lock().expect("switch state lock poisoned");
        state.handlers.insert(name.to_string(), handler);
    }

    /// Activate a switch. Repeat activations before the worker runs collapse
    /// into one invocation; the last context wins.
    pub fn activate(&self, name: &str, context: Value) {
        let mut state = self.state.lock().expect("switch state lock poisoned");
        if let Some(entry) = state.pending.iter_mut().find(|(n, _)| n == name) {
            entry.1 = context;
        } else {
            state.pending.push((name.to_string(), context));
        }
        tracing::debug!(switch = name, "switch activated");
    }

    /// Activate with an empty context.
    pub fn activate_switch(&self, name: &str) {
        self.activate(name, Value::Null);
    }

    pub fn pending_count(&self) -> usize {
        self.state
            .lock()
            .expect("switch state lock poisoned")
            .pending
            .len()
    }

    /// Run a switch handler inline, removing any pending activation for it.
    pub async fn run_now(&self, name: &str, context: Value) -> anyhow::Result<()> {
        let handler = {
            let mut state = self.state.lock().expect("switch state lock poisoned");
            state.pending.retain(|(n, _)| n != name);
            state.handlers.get(name).cloned()
        };
        match handler {
            Some(handler) => handler(context).await,
            None => Err(anyhow::anyhow!("No switch handler defined for: {}", name)),
        }
    }

    /// Pop and run the oldest pending activation, if any. Returns whether an
    /// activation was handled. Handler errors are logged, never propagated;
    /// the next activation reruns the handler.
    pub async fn process_one(&self) -> bool {
        let entry = {
            let mut state = self.state.lock().expect("switch state lock poisoned");
            if state.pending.is_empty() {
                None
            } else {
                let (name, context) = state.pending.remove(0);
                Some((state.handlers.get(&name).cloned(), name, context))
            }
        };

        let Some((handler, name, context)) = entry else {
            return false;
        };

        match handler {
            Some(handler) => {
                if let Err(e) = handler(context).await {
                    tracing::error!(switch = %name, error = %e, "Switch handler failed");
                }
            }
            None => {
                tracing::error!(switch = %name, "No switch handler defined");
            }
        }
        true
    }

    /// Spawn the worker loop. One activation is handled at a time, so every
    /// handler is single-flight.
    pub fn spawn_worker(&self) {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        *self
            .shutdown_tx
            .lock()
            .expect("switch shutdown lock poisoned") = Some(shutdown_tx);

        let bus = self.clone();
        tokio::spawn(async move {
            tracing::info!("Switch worker started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Switch worker shutting down");
                        break;
                    }
                    _ = sleep(Duration::from_millis(POLL_INTERVAL_MS)) => {
                        // Drain everything that accumulated during the sleep.
                        while bus.process_one().await {}
                    }
                }
            }
        });
    }

    /// Signal the worker loop to exit. Does not wait for in-flight handlers.
    pub async fn shutdown(&self) {
        let tx = self
            .shutdown_tx
            .lock()
            .expect("switch shutdown lock poisoned")
            .clone();
        if let Some(tx) = tx {
            let _ = tx.send(()).await;
        }
    }
}

impl Default for SwitchBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_bus() -> (SwitchBus, Arc<AtomicUsize>, Arc<Mutex<Vec<Value>>>) {
        let bus = SwitchBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let contexts: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

        let calls_clone = calls.clone();
        let contexts_clone = contexts.clone();
        bus.register("save_config", move |context| {
            let calls = calls_clone.clone();
            let contexts = contexts_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                contexts.lock().unwrap().push(context);
                Ok(())
            }
        });
        (bus, calls, contexts)
    }

    #[tokio::test]
    async fn repeated_activations_collapse() {
        let (bus, calls, contexts) = counting_bus();
        bus.activate("save_config", json!({"n": 1}));
        bus.activate("save_config", json!({"n": 2}));
        bus.activate("save_config", json!({"n": 3}));
        assert_eq!(bus.pending_count(), 1);

        assert!(bus.process_one().await);
        assert!(!bus.process_one().await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Last context wins.
        assert_eq!(contexts.lock().unwrap()[0], json!({"n": 3}));
    }

    #[tokio::test]
    async fn distinct_switches_run_in_arrival_order() {
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let bus = SwitchBus::new();
        for name in ["first", "second"] {
            let order = order.clone();
            bus.register(name, move |_| {
                let order = order.clone();
                async move {
                    order.lock().unwrap().push(name);
                    Ok(())
                }
            });
        }

        bus.activate_switch("first");
        bus.activate_switch("second");
        while bus.process_one().await {}
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn handler_errors_are_isolated() {
        let bus = SwitchBus::new();
        bus.register("explodes", |_| async { Err(anyhow::anyhow!("boom")) });
        bus.activate_switch("explodes");
        assert!(bus.process_one().await);

        // The next activation reruns the handler.
        bus.activate_switch("explodes");
        assert_eq!(bus.pending_count(), 1);
        assert!(bus.process_one().await);
    }

    #[tokio::test]
    async fn unknown_switch_is_logged_not_fatal() {
        let bus = SwitchBus::new();
        bus.activate_switch("never_registered");
        assert!(bus.process_one().await);
        assert_eq!(bus.pending_count(), 0);
    }

    #[tokio::test]
    async fn spawned_worker_drains_activations() {
        let (bus, calls, _) = counting_bus();
        bus.spawn_worker();
        bus.activate_switch("save_config");

        // The worker polls every 100ms; give it a few cycles.
        for _ in 0..20 {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            if calls.load(Ordering::SeqCst) > 0 {
                break;
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.pending_count(), 0);
        bus.shutdown().await;
    }

    #[tokio::test]
    async fn run_now_removes_pending_activation() {
        let (bus, calls, _) = counting_bus();
        bus.activate("save_config", json!({"n": 1}));
        bus.run_now("save_config", Value::Null).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // The pending activation was displaced by the inline run.
        assert_eq!(bus.pending_count(), 0);
        assert!(!bus.process_one().await);
    }
}
