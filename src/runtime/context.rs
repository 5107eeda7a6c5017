//! Context chain - values a component makes visible to its descendants.
//!
//! Each component owns one frame. A child's frame points at its parent's
//! frame; lookups walk outward until a key matches. Parents never point at
//! children.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Result, RuntimeError};

struct Frame {
    parent: Option<Rc<Frame>>,
    values: RefCell<HashMap<String, Rc<dyn Any>>>,
}

/// Handle to one frame of the context chain.
#[derive(Clone)]
pub struct Context {
    frame: Rc<Frame>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Empty root frame.
    pub fn new() -> Self {
        Self {
            frame: Rc::new(Frame {
                parent: None,
                values: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Empty frame that inherits this one.
    pub fn child(&self) -> Self {
        Self {
            frame: Rc::new(Frame {
                parent: Some(self.frame.clone()),
                values: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Builder form of [`Context::set`], for `ComponentOptions::context`.
    pub fn with<T: 'static>(self, key: &str, value: T) -> Self {
        self.set(key, value);
        self
    }

    /// Set `key` in this frame, shadowing any ancestor value.
    pub fn set<T: 'static>(&self, key: &str, value: T) {
        self.frame
            .values
            .borrow_mut()
            .insert(key.to_string(), Rc::new(value));
    }

    /// Nearest value for `key`.
    ///
    /// `Ok(None)` when no frame has the key; `ContextTypeMismatch` when the
    /// nearest value is not a `T`.
    pub fn get<T: Clone + 'static>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.lookup(key) else {
            return Ok(None);
        };
        value
            .downcast_ref::<T>()
            .cloned()
            .map(Some)
            .ok_or_else(|| RuntimeError::ContextTypeMismatch {
                key: key.to_string(),
            })
    }

    /// Whether any frame has `key`.
    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Every visible key, nearest frame first, without duplicates.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        let mut frame = Some(&self.frame);
        while let Some(current) = frame {
            let mut own: Vec<String> = current.values.borrow().keys().cloned().collect();
            own.sort();
            for key in own {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
            frame = current.parent.as_ref();
        }
        keys
    }

    fn lookup(&self, key: &str) -> Option<Rc<dyn Any>> {
        let mut frame = Some(&self.frame);
        while let Some(current) = frame {
            if let Some(value) = current.values.borrow().get(key) {
                return Some(value.clone());
            }
            frame = current.parent.as_ref();
        }
        None
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("keys", &self.keys()).finish()
    }
}
