use anyhow::{Result, anyhow};
use std::fmt;
use std::sync::Arc;

use crate::message::Payload;

pub mod expression;

pub use expression::ExpressionManipulator;

/// In-process payload transformation used by `manipulate_payload` tasks.
///
/// Manipulators run synchronously inside the process transaction, so they
/// must be quick and free of I/O.
pub trait PayloadManipulator: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
    fn manipulate(&self, payload: &mut Payload) -> Result<()>;
}

type ManipulateFn = dyn Fn(&mut Payload) -> Result<()> + Send + Sync;

/// Wraps a closure as a manipulator.
#[derive(Clone)]
pub struct FnManipulator {
    name: String,
    f: Arc<ManipulateFn>,
}

impl FnManipulator {
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: Fn(&mut Payload) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            f: Arc::new(f),
        }
    }
}

impl fmt::Debug for FnManipulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnManipulator").field("name", &self.name).finish()
    }
}

impl PayloadManipulator for FnManipulator {
    fn name(&self) -> &str {
        &self.name
    }

    fn manipulate(&self, payload: &mut Payload) -> Result<()> {
        (self.f)(payload)
    }
}

/// Built-in manipulator that drops every field not listed.
#[derive(Debug)]
pub struct KeepFields {
    name: String,
    fields: Vec<String>,
}

impl KeepFields {
    pub fn new(name: &str, fields: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            fields,
        }
    }
}

impl PayloadManipulator for KeepFields {
    fn name(&self) -> &str {
        &self.name
    }

    fn manipulate(&self, payload: &mut Payload) -> Result<()> {
        let obj = payload
            .data_mut()
            .as_object_mut()
            .ok_or_else(|| anyhow!("'{}' expects an object payload", self.name))?;
        obj.retain(|k, _| self.fields.iter().any(|f| f == k));
        Ok(())
    }
}
