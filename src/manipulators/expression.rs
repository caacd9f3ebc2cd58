use anyhow::{Result, anyhow};
use evalexpr::{ContextWithMutableVariables, DefaultNumericTypes, HashMapContext, build_operator_tree};
use serde_json::{Value, json};
use tracing::debug;

use crate::manipulators::PayloadManipulator;
use crate::message::Payload;

#[derive(Debug)]
struct Assignment {
    field: String,
    expression: evalexpr::Node<DefaultNumericTypes>,
    raw: String,
}

/// Evaluates `field = expression` assignments against the fields of an object
/// payload, e.g. `total = price * quantity`. Assignments run in order and see
/// the results of the previous ones.
#[derive(Debug)]
pub struct ExpressionManipulator {
    name: String,
    assignments: Vec<Assignment>,
}

impl ExpressionManipulator {
    pub fn new(name: &str, assignments: &[String]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(assignments.len());
        for raw in assignments {
            let (field, rhs) = raw
                .split_once('=')
                .ok_or_else(|| anyhow!("assignment '{}' has no '='", raw))?;
            let field = field.trim();
            if field.is_empty() || !field.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(anyhow!("invalid field name in assignment '{}'", raw));
            }
            compiled.push(Assignment {
                field: field.to_string(),
                expression: build_operator_tree(rhs.trim())?,
                raw: raw.clone(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            assignments: compiled,
        })
    }
}

fn to_eval_value(value: &Value) -> Option<evalexpr::Value<DefaultNumericTypes>> {
    match value {
        Value::String(s) => Some(evalexpr::Value::String(s.clone())),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(evalexpr::Value::Int(i))
            } else {
                n.as_f64().map(evalexpr::Value::Float)
            }
        }
        Value::Bool(b) => Some(evalexpr::Value::Boolean(*b)),
        _ => None,
    }
}

fn to_json_value(value: evalexpr::Value<DefaultNumericTypes>) -> Option<Value> {
    match value {
        evalexpr::Value::String(s) => Some(Value::String(s)),
        evalexpr::Value::Int(i) => Some(json!(i)),
        evalexpr::Value::Float(f) => Some(json!(f)),
        evalexpr::Value::Boolean(b) => Some(Value::Bool(b)),
        _ => None,
    }
}

impl PayloadManipulator for ExpressionManipulator {
    fn name(&self) -> &str {
        &self.name
    }

    fn manipulate(&self, payload: &mut Payload) -> Result<()> {
        let obj = payload
            .data_mut()
            .as_object_mut()
            .ok_or_else(|| anyhow!("'{}' expects an object payload", self.name))?;

        let mut eval_ctx = HashMapContext::<DefaultNumericTypes>::new();
        for (k, v) in obj.iter() {
            if let Some(ev) = to_eval_value(v) {
                eval_ctx.set_value(k.clone(), ev)?;
            }
        }

        for assignment in &self.assignments {
            let result = assignment
                .expression
                .eval_with_context(&eval_ctx)
                .map_err(|e| anyhow!("evaluating '{}' failed: {}", assignment.raw, e))?;
            let json_val = to_json_value(result.clone())
                .ok_or_else(|| anyhow!("'{}' produced an unsupported value", assignment.raw))?;

            debug!(manipulator = %self.name, field = %assignment.field, value = %json_val, "Assigned field");
            obj.insert(assignment.field.clone(), json_val);
            eval_ctx.set_value(assignment.field.clone(), result)?;
        }

        Ok(())
    }
}
