//! Page content rewriting.
//!
//! The editor replays a page's operations through the [`StreamEngine`] and
//! hands each one, together with the state it produced, to an
//! [`EditFilter`]. Whatever the filter writes becomes the new page content.

use lopdf::content::{Content, Operation};
use lopdf::{Document as LopdfDocument, Object, ObjectId};

use super::engine::{GraphicsState, StreamEngine, TextSpan};
use crate::document::set_page_content;
use crate::error::{Error, Result};

/// Collects the operations of a rewritten content stream.
#[derive(Debug, Default)]
pub struct ContentWriter {
    operations: Vec<Operation>,
}

impl ContentWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation as-is.
    pub fn write_operation(&mut self, op: &Operation) {
        self.operations.push(op.clone());
    }

    /// Append `operands operator`.
    pub fn write(&mut self, operator: &str, operands: Vec<Object>) {
        self.operations.push(Operation::new(operator, operands));
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Serialise the collected operations.
    pub fn encode(self) -> Result<Vec<u8>> {
        Content {
            operations: self.operations,
        }
        .encode()
        .map_err(|e| Error::ContentStream(e.to_string()))
    }
}

/// Decides what is written for each replayed operation.
pub trait EditFilter {
    /// Called after `op` has been applied to `state`.
    ///
    /// `span` holds the page-space text matrices of a text-showing
    /// operation and is empty for everything else.
    fn write(
        &mut self,
        writer: &mut ContentWriter,
        op: &Operation,
        state: &GraphicsState,
        span: &TextSpan,
    ) -> Result<()> {
        let _ = (state, span);
        writer.write_operation(op);
        Ok(())
    }
}

/// Filter that copies every operation unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl EditFilter for PassThrough {}

/// Rewrites page content streams through an [`EditFilter`].
#[derive(Debug, Clone, Copy)]
pub struct ContentStreamEditor {
    compress: bool,
}

impl Default for ContentStreamEditor {
    fn default() -> Self {
        Self { compress: true }
    }
}

impl ContentStreamEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flate-compress the rewritten stream (default: true).
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Replay one page and return the rewritten content bytes.
    pub fn rewrite(
        &self,
        doc: &LopdfDocument,
        page_id: ObjectId,
        filter: &mut dyn EditFilter,
    ) -> Result<Vec<u8>> {
        let mut engine = StreamEngine::new(doc).with_form_descent(false);
        let operations = engine.begin_page(page_id)?;
        let mut writer = ContentWriter::new();
        for op in &operations {
            let span = engine.process_operation(op, &mut ())?;
            filter.write(&mut writer, op, engine.state(), &span)?;
        }
        log::debug!(
            "Rewrote page {:?}: {} operations in, {} out",
            page_id,
            operations.len(),
            writer.len()
        );
        writer.encode()
    }

    /// Rewrite one page in place.
    pub fn edit_page(
        &self,
        doc: &mut LopdfDocument,
        page_id: ObjectId,
        filter: &mut dyn EditFilter,
    ) -> Result<()> {
        let content = self.rewrite(doc, page_id, filter)?;
        set_page_content(doc, page_id, content, self.compress)
    }
}
