use crate::error::{IngestError, Result};

use super::handlers::{IntercomMrtHandler, SurveyMultiRefHandler};
use super::FormatHandler;

/// Ordered collection of the registered source formats.
///
/// This is the only mutable surface of the pipeline, and only until the
/// coordinator takes ownership of it. Adding a new source format is one
/// `register` call plus a handler implementation; no other component
/// changes.
pub struct FormatRegistry {
    handlers: Vec<Box<dyn FormatHandler>>,
}

impl FormatRegistry {
    /// An empty registry, for callers wiring a fully custom format set.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// A registry preloaded with the built-in handlers.
    pub fn with_builtin() -> Self {
        Self {
            handlers: vec![
                Box::new(IntercomMrtHandler),
                Box::new(SurveyMultiRefHandler),
            ],
        }
    }

    /// Register a handler. A duplicate tag is a programmer error surfaced
    /// at startup; the handler is not registered in that case.
    pub fn register(&mut self, handler: Box<dyn FormatHandler>) -> Result<()> {
        if self.handlers.iter().any(|h| h.tag() == handler.tag()) {
            return Err(IngestError::DuplicateFormatTag {
                tag: handler.tag().to_string(),
            });
        }
        self.handlers.push(handler);
        Ok(())
    }

    pub fn by_tag(&self, tag: &str) -> Result<&dyn FormatHandler> {
        self.handlers
            .iter()
            .find(|h| h.tag() == tag)
            .map(|h| h.as_ref())
            .ok_or_else(|| IngestError::UnknownFormatTag {
                tag: tag.to_string(),
            })
    }

    /// Handlers sorted by priority descending; registration order breaks
    /// ties (the sort is stable).
    pub fn ordered(&self) -> Vec<&dyn FormatHandler> {
        let mut ordered: Vec<&dyn FormatHandler> =
            self.handlers.iter().map(|h| h.as_ref()).collect();
        ordered.sort_by_key(|h| std::cmp::Reverse(h.priority()));
        ordered
    }

    /// Registered format tags, in recognition order.
    pub fn tags(&self) -> Vec<&'static str> {
        self.ordered().iter().map(|h| h.tag()).collect()
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
