mod health;
pub mod implementations;

pub use health::ServiceHealth;

use crate::config::Config;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Time allowed for each service task to finish after shutdown is signalled
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Long-running component started and stopped by the `ServiceManager`
#[async_trait]
pub trait Service: Send + Sync {
    /// Unique service identifier
    fn name(&self) -> &'static str;

    /// Lower starts earlier and stops later
    fn priority(&self) -> i32 {
        100
    }

    /// Services that must be started before this one
    fn dependencies(&self) -> Vec<&'static str> {
        vec![]
    }

    fn is_enabled(&self, _config: &Config) -> bool {
        true
    }

    async fn initialize(&mut self) -> Result<(), String> {
        Ok(())
    }

    /// Spawn the service's tasks; they must exit once `shutdown` is notified
    async fn start(&mut self, shutdown: Arc<Notify>) -> Result<Vec<JoinHandle<()>>, String>;

    async fn stop(&mut self) -> Result<(), String> {
        Ok(())
    }

    async fn health(&self) -> ServiceHealth {
        ServiceHealth::Healthy
    }
}

pub struct ServiceManager {
    services: HashMap<&'static str, Box<dyn Service>>,
    handles: HashMap<&'static str, Vec<JoinHandle<()>>>,
    shutdown: Arc<Notify>,
    config: Config,
}

impl ServiceManager {
    pub fn new(config: Config) -> Self {
        Self {
            services: HashMap::new(),
            handles: HashMap::new(),
            shutdown: Arc::new(Notify::new()),
            config,
        }
    }

    pub fn register(&mut self, service: Box<dyn Service>) {
        let name = service.name();
        self.services.insert(name, service);
    }

    /// Start all enabled services in dependency and priority order
    pub async fn start_all(&mut self) -> Result<(), String> {
        let enabled: Vec<&'static str> = self
            .services
            .iter()
            .filter(|(_, service)| service.is_enabled(&self.config))
            .map(|(name, _)| *name)
            .collect();

        let ordered = self.resolve_startup_order(&enabled)?;
        logger::debug(LogTag::System, &format!("Service startup order: {:?}", ordered));

        for name in ordered {
            if let Some(service) = self.services.get_mut(name) {
                service.initialize().await?;
                let handles = service.start(self.shutdown.clone()).await?;
                self.handles.insert(name, handles);
                logger::info(LogTag::System, &format!("Service started: {}", name));
            }
        }

        Ok(())
    }

    /// Signal shutdown, then stop services in reverse startup order
    pub async fn stop_all(&mut self) -> Result<(), String> {
        self.shutdown.notify_waiters();

        let running: Vec<&'static str> = self.handles.keys().copied().collect();
        let mut ordered = self.resolve_startup_order(&running)?;
        ordered.reverse();

        for name in ordered {
            if let Some(service) = self.services.get_mut(name) {
                if let Err(e) = service.stop().await {
                    logger::warning(
                        LogTag::System,
                        &format!("Service stop error for {}: {}", name, e),
                    );
                }

                if let Some(handles) = self.handles.remove(name) {
                    for handle in handles {
                        if tokio::time::timeout(STOP_JOIN_TIMEOUT, handle).await.is_err() {
                            logger::warning(
                                LogTag::System,
                                &format!("Service {} did not stop within {:?}", name, STOP_JOIN_TIMEOUT),
                            );
                        }
                    }
                }

                logger::info(LogTag::System, &format!("Service stopped: {}", name));
            }
        }

        Ok(())
    }

    fn resolve_startup_order(
        &self,
        services: &[&'static str],
    ) -> Result<Vec<&'static str>, String> {
        fn visit(
            name: &'static str,
            services: &HashMap<&'static str, Box<dyn Service>>,
            ordered: &mut Vec<&'static str>,
            visited: &mut HashSet<&'static str>,
            visiting: &mut HashSet<&'static str>,
        ) -> Result<(), String> {
            if visited.contains(name) {
                return Ok(());
            }
            if !visiting.insert(name) {
                return Err(format!("Circular dependency detected for service: {}", name));
            }

            if let Some(service) = services.get(name) {
                for dep in service.dependencies() {
                    visit(dep, services, ordered, visited, visiting)?;
                }
            }

            visiting.remove(name);
            visited.insert(name);
            ordered.push(name);
            Ok(())
        }

        let mut ordered = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();
        for &name in services {
            visit(name, &self.services, &mut ordered, &mut visited, &mut visiting)?;
        }

        // stable sort keeps dependency order among equal priorities
        ordered.sort_by_key(|name| self.services.get(name).map(|s| s.priority()).unwrap_or(100));
        Ok(ordered)
    }

    pub async fn get_health(&self) -> HashMap<&'static str, ServiceHealth> {
        let mut health = HashMap::new();
        for (name, service) in &self.services {
            health.insert(*name, service.health().await);
        }
        health
    }
}
