// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(0);

/// Process-wide unique identifier of a register or label.
///
/// Physical registers and label names are only assigned by the compiler;
/// until then a symbol is known by its id alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u64);

impl SymbolId {
    pub(crate) fn fresh() -> Self {
        SymbolId(NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An assembly label. The compiler names it `<prefix><n>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label {
    pub(crate) id: SymbolId,
    prefix: String,
}

impl Label {
    pub(crate) fn new<S: Into<String>>(prefix: S) -> Self {
        Self {
            id: SymbolId::fresh(),
            prefix: prefix.into(),
        }
    }

    pub fn id(&self) -> SymbolId {
        self.id
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
