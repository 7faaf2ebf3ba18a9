//! Modeler and after-refresh registries
//!
//! A modeler promotes a FileGroup to a typed entity during the deep pass.
//! Modelers register with a mimetype prefix; `text/` matches both
//! `text/html` and `text/plain`. After-refresh hooks run once per full
//! refresh, sequentially, so each is single-flight.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use arca_core::models::FileGroup;

/// Promotes a surface-indexed FileGroup into a typed entity.
#[async_trait]
pub trait Modeler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Mimetype prefix this modeler handles (`text/html`, `video/`).
    fn mimetype_prefix(&self) -> &'static str;

    /// Deep-model the group, mutating it in place. Returns `true` when the
    /// group was claimed; later modelers are skipped for a claimed group.
    async fn model(&self, file_group: &mut FileGroup) -> Result<bool>;
}

/// Ordered modeler registry. Registration happens at startup; the registry
/// is shared immutably afterwards.
#[derive(Default)]
pub struct ModelerRegistry {
    modelers: Vec<Arc<dyn Modeler>>,
}

impl ModelerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, modeler: Arc<dyn Modeler>) {
        self.modelers.push(modeler);
    }

    /// Modelers whose prefix matches `mimetype`, in registration order.
    pub fn matching(&self, mimetype: &str) -> Vec<Arc<dyn Modeler>> {
        self.modelers
            .iter()
            .filter(|m| mimetype.starts_with(m.mimetype_prefix()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.modelers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modelers.is_empty()
    }
}

type HookFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
type Hook = Arc<dyn Fn() -> HookFuture + Send + Sync>;

/// Cleanup functions run once after each full refresh. Hooks must be
/// idempotent; they are invoked sequentially in registration order.
#[derive(Default)]
pub struct AfterRefreshRegistry {
    hooks: Vec<(String, Hook)>,
}

impl AfterRefreshRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, name: &str, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.hooks
            .push((name.to_string(), Arc::new(move || Box::pin(hook()))));
    }

    /// Run every hook. A failing hook is logged and does not stop the rest.
    pub async fn run_all(&self) {
        for (name, hook) in &self.hooks {
            tracing::debug!(hook = %name, "Running after-refresh hook");
            if let Err(e) = hook().await {
                tracing::error!(hook = %name, error = %e, "After-refresh hook failed");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubModeler {
        name: &'static str,
        prefix: &'static str,
    }

    #[async_trait]
    impl Modeler for StubModeler {
        fn name(&self) -> &'static str {
            self.name
        }

        fn mimetype_prefix(&self) -> &'static str {
            self.prefix
        }

        async fn model(&self, _file_group: &mut FileGroup) -> Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn prefix_matching() {
        let mut registry = ModelerRegistry::new();
        registry.register(Arc::new(StubModeler {
            name: "archive",
            prefix: "text/html",
        }));
        registry.register(Arc::new(StubModeler {
            name: "text",
            prefix: "text/",
        }));
        registry.register(Arc::new(StubModeler {
            name: "video",
            prefix: "video/",
        }));

        let matched: Vec<&str> = registry
            .matching("text/html")
            .iter()
            .map(|m| m.name())
            .collect();
        assert_eq!(matched, vec!["archive", "text"]);

        let matched: Vec<&str> = registry
            .matching("video/mp4")
            .iter()
            .map(|m| m.name())
            .collect();
        assert_eq!(matched, vec!["video"]);

        assert!(registry.matching("image/png").is_empty());
    }

    #[tokio::test]
    async fn hooks_run_in_order_and_errors_are_isolated() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = AfterRefreshRegistry::new();

        registry.register("fails", || async { Err(anyhow::anyhow!("nope")) });
        let counter_clone = counter.clone();
        registry.register("counts", move || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        registry.run_all().await;
        registry.run_all().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
