pub mod alert;
pub mod metric;
pub mod rpc;
pub mod service;

use std::fmt;
use std::str::FromStr;

/// The resource kinds this provider reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Alert,
    Metric,
    Service,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Alert => "alert",
            ResourceKind::Metric => "metric",
            ResourceKind::Service => "service",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alert" | "alerts" => Ok(ResourceKind::Alert),
            "metric" | "metrics" => Ok(ResourceKind::Metric),
            "service" | "services" => Ok(ResourceKind::Service),
            other => Err(format!("unknown resource kind: {other}")),
        }
    }
}
