use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed payload of a workflow message.
///
/// The structural type system lives outside the engine: here a type is just a
/// name, and a collection is a payload with an `item_type` whose data is a
/// JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    item_type: Option<String>,
    #[serde(default)]
    data: Value,
}

impl Payload {
    pub fn new(type_name: &str, data: Value) -> Self {
        Self {
            type_name: type_name.to_string(),
            item_type: None,
            data,
        }
    }

    /// An empty payload acting as prototype for a collect-data request.
    pub fn prototype(type_name: &str) -> Self {
        Self::new(type_name, Value::Null)
    }

    pub fn collection(type_name: &str, item_type: &str, items: Vec<Value>) -> Self {
        Self {
            type_name: type_name.to_string(),
            item_type: Some(item_type.to_string()),
            data: Value::Array(items),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn item_type(&self) -> Option<&str> {
        self.item_type.as_deref()
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Value {
        &mut self.data
    }

    pub fn into_data(self) -> Value {
        self.data
    }

    pub fn is_collection(&self) -> bool {
        self.item_type.is_some() && self.data.is_array()
    }

    /// Splits a collection into one payload per element, typed with the
    /// collection's item type. Returns `None` for non-collections.
    pub fn items(&self) -> Option<Vec<Payload>> {
        let item_type = self.item_type.as_deref()?;
        let items = self.data.as_array()?;
        Some(items.iter().map(|item| Payload::new(item_type, item.clone())).collect())
    }

    /// Converts the payload to `type_name`.
    ///
    /// The primitive names `string`, `integer`, `float` and `boolean` coerce
    /// the data; any other name re-tags the payload and keeps the data.
    pub fn convert_to(&self, type_name: &str) -> Result<Payload, String> {
        let data = match type_name {
            "string" => match &self.data {
                Value::String(s) => Value::String(s.clone()),
                Value::Number(n) => Value::String(n.to_string()),
                Value::Bool(b) => Value::String(b.to_string()),
                other => return Err(format!("cannot convert {} to string", other)),
            },
            "integer" => match &self.data {
                Value::Number(n) if n.is_i64() => self.data.clone(),
                Value::Number(n) => match n.as_f64() {
                    Some(f) if f.fract() == 0.0 => Value::from(f as i64),
                    _ => return Err(format!("cannot convert {} to integer", n)),
                },
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|e| format!("cannot convert '{}' to integer: {}", s, e))?,
                other => return Err(format!("cannot convert {} to integer", other)),
            },
            "float" => match &self.data {
                Value::Number(n) => n.as_f64().map(Value::from).ok_or("number out of range")?,
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::from)
                    .map_err(|e| format!("cannot convert '{}' to float: {}", s, e))?,
                other => return Err(format!("cannot convert {} to float", other)),
            },
            "boolean" => match &self.data {
                Value::Bool(_) => self.data.clone(),
                Value::String(s) if s == "true" || s == "false" => Value::Bool(s == "true"),
                Value::Number(n) => Value::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
                other => return Err(format!("cannot convert {} to boolean", other)),
            },
            _ => self.data.clone(),
        };

        Ok(Payload {
            type_name: type_name.to_string(),
            item_type: None,
            data,
        })
    }
}
