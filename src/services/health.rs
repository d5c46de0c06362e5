/// Service health status
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceHealth {
    /// Operating normally
    Healthy,

    /// Operating with reduced fidelity (e.g. backend-only, or serving a stale feed)
    Degraded(String),

    /// Not doing its job
    Unhealthy(String),

    Starting,

    Stopping,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ServiceHealth::Healthy)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ServiceHealth::Degraded(_))
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, ServiceHealth::Unhealthy(_))
    }
}

impl std::fmt::Display for ServiceHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceHealth::Healthy => write!(f, "healthy"),
            ServiceHealth::Degraded(reason) => write!(f, "degraded: {}", reason),
            ServiceHealth::Unhealthy(reason) => write!(f, "unhealthy: {}", reason),
            ServiceHealth::Starting => write!(f, "starting"),
            ServiceHealth::Stopping => write!(f, "stopping"),
        }
    }
}
