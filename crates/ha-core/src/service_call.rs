//! Service-call events observed on the backend

use serde::{Deserialize, Serialize};

/// A service invocation seen on the backend (e.g., `light.turn_on`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallServiceEvent {
    /// The domain the service belongs to (e.g., "light", "script")
    pub domain: String,

    /// The service name (e.g., "turn_on")
    pub service: String,

    /// Data passed to the service
    #[serde(default)]
    pub service_data: serde_json::Value,
}

impl CallServiceEvent {
    /// Create a new service-call event
    pub fn new(
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: serde_json::Value,
    ) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            service_data,
        }
    }

    /// Full service identifier (domain.service)
    pub fn service_id(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }

    /// Entity id(s) targeted by the call, whether given as a string or a list
    pub fn entity_ids(&self) -> Vec<String> {
        match self.service_data.get("entity_id") {
            Some(serde_json::Value::String(s)) => vec![s.clone()],
            Some(serde_json::Value::Array(arr)) => arr
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_id() {
        let call = CallServiceEvent::new("light", "turn_on", json!({}));
        assert_eq!(call.service_id(), "light.turn_on");
    }

    #[test]
    fn test_entity_ids() {
        let single = CallServiceEvent::new("light", "turn_on", json!({"entity_id": "light.a"}));
        assert_eq!(single.entity_ids(), vec!["light.a"]);

        let multiple = CallServiceEvent::new(
            "light",
            "turn_on",
            json!({"entity_id": ["light.a", "light.b"]}),
        );
        assert_eq!(multiple.entity_ids(), vec!["light.a", "light.b"]);

        let none = CallServiceEvent::new("script", "run", json!({}));
        assert!(none.entity_ids().is_empty());
    }
}
