//! Layout metadata returned by `GET layouts/{layout}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, ProtocolError};

/// Field, portal and value-list description of one layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutMetadata {
    #[serde(default)]
    pub field_meta_data: Vec<FieldMeta>,
    #[serde(default)]
    pub portal_meta_data: Map<String, Value>,
    #[serde(default)]
    pub value_lists: Vec<ValueList>,
}

impl LayoutMetadata {
    /// Parse the `response` object of a metadata envelope.
    pub fn from_body(body: &Value) -> Result<Self, Error> {
        let response = body.get("response").cloned().unwrap_or_default();
        serde_json::from_value(response).map_err(|e| {
            ProtocolError::new(200, Some(format!("malformed layout metadata: {}", e))).into()
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.field_meta_data.iter().find(|f| f.name == name)
    }

    pub fn value_list(&self, name: &str) -> Option<&ValueList> {
        self.value_lists.iter().find(|v| v.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.field_meta_data.iter().map(|f| f.name.clone()).collect()
    }
}

/// Description of one field on a layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub display_type: String,
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_list: Option<String>,
    pub global: bool,
    pub auto_enter: bool,
    pub four_digit_year: bool,
    pub max_repeat: u32,
    pub max_characters: u32,
    pub not_empty: bool,
    pub numeric: bool,
    pub time_of_day: bool,
    pub repetition_start: u32,
    pub repetition_end: u32,
}

/// A value list defined on the layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueList {
    pub name: String,
    #[serde(rename = "type")]
    pub list_type: String,
    pub values: Vec<ValueListItem>,
}

impl ValueList {
    /// Stored value for a display value.
    pub fn get(&self, display: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|item| item.display() == display)
            .map(|item| item.value.as_str())
    }

    /// `(display value, stored value)` pairs in list order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.values
            .iter()
            .map(|item| (item.display().to_string(), item.value.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValueListItem {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
}

impl ValueListItem {
    /// Display value, falling back to the stored value.
    pub fn display(&self) -> &str {
        self.display_value.as_deref().unwrap_or(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layout_body() -> Value {
        json!({
            "response": {
                "fieldMetaData": [{
                    "name": "CustomerName",
                    "type": "normal",
                    "displayType": "editText",
                    "result": "text",
                    "valueList": "Text",
                    "global": false,
                    "autoEnter": false,
                    "fourDigitYear": false,
                    "maxRepeat": 1,
                    "maxCharacters": 0,
                    "notEmpty": false,
                    "numeric": false,
                    "timeOfDay": false,
                    "repetitionStart": 1,
                    "repetitionEnd": 1
                }, {
                    "name": "Region",
                    "type": "normal",
                    "result": "text"
                }],
                "portalMetaData": {},
                "valueLists": [{
                    "name": "Region",
                    "type": "customList",
                    "values": [
                        {"value": "West", "displayValue": "West"},
                        {"value": "East", "displayValue": "East"}
                    ]
                }, {
                    "name": "value_list_name",
                    "type": "byField",
                    "values": [
                        {"value": "111", "displayValue": "Aaa"},
                        {"value": "222", "displayValue": "bBb"}
                    ]
                }]
            },
            "messages": [{"code": "0", "message": "OK"}]
        })
    }

    #[test]
    fn parses_field_metadata() {
        let layout = LayoutMetadata::from_body(&layout_body()).unwrap();
        assert_eq!(layout.field_names(), vec!["CustomerName", "Region"]);

        let field = layout.field("CustomerName").unwrap();
        assert_eq!(field.display_type, "editText");
        assert_eq!(field.value_list.as_deref(), Some("Text"));
        assert_eq!(field.repetition_end, 1);

        let sparse = layout.field("Region").unwrap();
        assert_eq!(sparse.display_type, "");
        assert!(!sparse.global);
    }

    #[test]
    fn value_list_maps_display_to_value() {
        let layout = LayoutMetadata::from_body(&layout_body()).unwrap();
        let list = layout.value_list("value_list_name").unwrap();
        assert_eq!(list.get("Aaa"), Some("111"));
        assert_eq!(list.get("West"), None);
        assert_eq!(
            list.entries(),
            vec![
                ("Aaa".to_string(), "111".to_string()),
                ("bBb".to_string(), "222".to_string())
            ]
        );
        assert!(layout.value_list("Missing").is_none());
    }

    #[test]
    fn field_meta_serializes_camel_case() {
        let layout = LayoutMetadata::from_body(&layout_body()).unwrap();
        let value = serde_json::to_value(layout.field("CustomerName").unwrap()).unwrap();
        assert_eq!(value["displayType"], json!("editText"));
        assert_eq!(value["type"], json!("normal"));
        assert_eq!(value["fourDigitYear"], json!(false));
    }
}
