// SPDX-FileCopyrightText: 2026 Hireloop Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-slot handler cell.
//!
//! Channel drivers load the handler at dispatch time instead of capturing it
//! when the socket opens, so replacing the handler takes effect for the very
//! next frame.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// Holds the current event handler, if any.
pub struct HandlerSlot<H: ?Sized + Send + Sync + 'static> {
    current: ArcSwapOption<Arc<H>>,
}

impl<H: ?Sized + Send + Sync + 'static> HandlerSlot<H> {
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }

    /// Replace the handler.
    pub fn set(&self, handler: Arc<H>) {
        self.current.store(Some(Arc::new(handler)));
    }

    pub fn clear(&self) {
        self.current.store(None);
    }

    /// The handler at this instant.
    pub fn current(&self) -> Option<Arc<H>> {
        self.current.load_full().map(|outer| Arc::clone(&*outer))
    }
}

impl<H: ?Sized + Send + Sync + 'static> Default for HandlerSlot<H> {
    fn default() -> Self {
        Self::new()
    }
}
