use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// An alert as the remote API sees it. Every attribute is optional so an
/// unset field is never sent on update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rearm_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services: Option<Vec<ServiceRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<AlertCondition>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AlertAttributes>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertCondition {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub condition_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detect_reset: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<AlertConditionTag>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertConditionTag {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouped: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runbook_url: Option<String>,
}

/// A service attached to an alert.
///
/// The API takes bare service ids on write but returns full service
/// objects on read; both decode into this shape, and it always encodes
/// back to the bare id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceRef {
    pub id: u64,
    pub title: Option<String>,
    pub service_type: Option<String>,
    pub settings: BTreeMap<String, String>,
}

impl ServiceRef {
    pub fn id(id: u64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireServiceRef {
    Id(u64),
    Object {
        id: u64,
        #[serde(default)]
        title: Option<String>,
        #[serde(rename = "type", default)]
        service_type: Option<String>,
        #[serde(default, deserialize_with = "super::service::loose_settings")]
        settings: BTreeMap<String, String>,
    },
}

impl<'de> Deserialize<'de> for ServiceRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match WireServiceRef::deserialize(deserializer)? {
            WireServiceRef::Id(id) => ServiceRef::id(id),
            WireServiceRef::Object {
                id,
                title,
                service_type,
                settings,
            } => ServiceRef {
                id,
                title,
                service_type,
                settings,
            },
        })
    }
}

impl Serialize for ServiceRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn services_decode_from_objects_or_ids() {
        let alert: Alert = serde_json::from_value(serde_json::json!({
            "id": 42,
            "name": "cpu-high",
            "services": [
                {"id": 7, "type": "mail", "title": "ops", "settings": {"addresses": "ops@example.com"}},
                9
            ]
        }))
        .unwrap();
        let services = alert.services.unwrap();
        assert_eq!(services[0].id, 7);
        assert_eq!(services[0].service_type.as_deref(), Some("mail"));
        assert_eq!(services[0].settings["addresses"], "ops@example.com");
        assert_eq!(services[1], ServiceRef::id(9));
    }

    #[test]
    fn unset_fields_are_not_serialized() {
        let alert = Alert {
            name: Some("cpu-high".to_string()),
            active: Some(true),
            md: Some(true),
            services: Some(vec![ServiceRef::id(7)]),
            ..Default::default()
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "cpu-high", "active": true, "md": true, "services": [7]})
        );
    }

    #[test]
    fn empty_attributes_serialize_as_empty_object() {
        let alert = Alert {
            name: Some("a".to_string()),
            attributes: Some(AlertAttributes::default()),
            ..Default::default()
        };
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["attributes"], serde_json::json!({}));
    }

    #[test]
    fn embedded_service_settings_are_decoded_loosely() {
        let alert: Alert = serde_json::from_value(serde_json::json!({
            "id": 42,
            "name": "cpu-high",
            "services": [
                {"id": 7, "type": "mail", "title": "ops", "settings": null},
                {"id": 8, "type": "campfire", "title": null, "settings": {"room": "x", "notify": true, "port": 5}}
            ]
        }))
        .unwrap();
        let services = alert.services.unwrap();
        assert!(services[0].settings.is_empty());
        assert_eq!(services[1].id, 8);
        assert_eq!(services[1].title, None);
        assert_eq!(services[1].settings["room"], "x");
        assert_eq!(services[1].settings["notify"], "true");
        assert_eq!(services[1].settings["port"], "5");
    }

    #[test]
    fn null_services_decode_as_unset() {
        let alert: Alert = serde_json::from_str(r#"{"id": 1, "name": "x", "services": null}"#).unwrap();
        assert_eq!(alert.services, None);
    }
}
