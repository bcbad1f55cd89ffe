//! Hooks for watching the box parser work.
//!
//! The parser never logs on its own. Pass a [`TracingObserver`] to get
//! `tracing` events, or implement [`ParseObserver`] to collect whatever you
//! need. Observers see events only; they cannot change the outcome of a parse.

use crate::boxes::{BoxHeader, BoxNode, BoxType};

pub trait ParseObserver {
    /// A header was resolved, before its payload is touched.
    fn on_header(&mut self, _hdr: &BoxHeader, _depth: usize) {}

    /// A bulk media payload was seeked over.
    fn on_skip(&mut self, _hdr: &BoxHeader, _depth: usize) {}

    /// A registered child showed up under a parent that does not list it.
    fn on_unexpected_child(&mut self, _parent: BoxType, _child: &BoxHeader) {}

    /// A node finished building.
    fn on_node(&mut self, _node: &BoxNode, _depth: usize) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ParseObserver for NoopObserver {}

/// Forwards parser events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ParseObserver for TracingObserver {
    fn on_header(&mut self, hdr: &BoxHeader, depth: usize) {
        tracing::trace!(
            typ = %hdr.typ,
            start = hdr.start,
            payload_size = hdr.payload_size,
            mode = ?hdr.size_mode,
            depth,
            "box header"
        );
    }

    fn on_skip(&mut self, hdr: &BoxHeader, depth: usize) {
        tracing::debug!(typ = %hdr.typ, bytes = hdr.payload_size, depth, "skipping media payload");
    }

    fn on_unexpected_child(&mut self, parent: BoxType, child: &BoxHeader) {
        tracing::warn!(%parent, child = %child.typ, offset = child.start, "unexpected child box");
    }

    fn on_node(&mut self, node: &BoxNode, depth: usize) {
        tracing::debug!(
            typ = %node.typ,
            offset = node.offset,
            children = node.children().len(),
            depth,
            "box parsed"
        );
    }
}
