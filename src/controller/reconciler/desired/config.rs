//! log4js configuration mounted into the console container.

use super::Inputs;
use crate::constants::LOG4JS_CONFIGMAP_NAME;
use k8s_openapi::api::core::v1::ConfigMap;
use serde_json::json;
use std::collections::BTreeMap;

/// Key of the rendered configuration inside the ConfigMap
pub const LOG4JS_KEY: &str = "log4js.json";

#[must_use]
pub fn log4js_config_map(inputs: &Inputs<'_>) -> ConfigMap {
    let level = inputs.settings.log_level.to_ascii_lowercase();
    let document = json!({
        "appenders": {
            "console": {
                "type": "console",
                "layout": {"type": "pattern", "pattern": "[%d] [%p] %c - %m"}
            }
        },
        "categories": {
            "default": {"appenders": ["console"], "level": level}
        }
    });

    ConfigMap {
        metadata: inputs.metadata(LOG4JS_CONFIGMAP_NAME),
        data: Some(BTreeMap::from([(
            LOG4JS_KEY.to_string(),
            document.to_string(),
        )])),
        ..Default::default()
    }
}
