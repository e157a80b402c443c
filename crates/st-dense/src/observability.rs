// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.

//! Hooks for observing matrix lifecycles (construction, copies, moves,
//! exports, and releases) without printing from constructors.

use std::cell::Cell;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock, RwLock};

/// Lifecycle transition reported to the observer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MatrixEventKind {
    /// Zero-filled or generated construction.
    Created,
    /// Construction from a foreign buffer descriptor.
    Imported,
    /// Deep copy into a fresh matrix.
    Copied,
    /// Deep copy into an existing matrix.
    CopyAssigned,
    /// Storage moved out of a matrix, leaving it empty.
    Moved,
    /// Storage moved into an existing matrix, releasing its previous storage.
    MoveAssigned,
    /// A buffer descriptor aliasing the storage was handed out.
    Exported,
    /// Owned storage was released.
    Released,
}

impl MatrixEventKind {
    pub fn label(self) -> &'static str {
        match self {
            MatrixEventKind::Created => "created",
            MatrixEventKind::Imported => "imported",
            MatrixEventKind::Copied => "copied",
            MatrixEventKind::CopyAssigned => "copy_assigned",
            MatrixEventKind::Moved => "moved",
            MatrixEventKind::MoveAssigned => "move_assigned",
            MatrixEventKind::Exported => "exported",
            MatrixEventKind::Released => "released",
        }
    }
}

impl fmt::Display for MatrixEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Shape of the matrix a lifecycle transition applied to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixEvent {
    pub kind: MatrixEventKind,
    pub rows: usize,
    pub cols: usize,
}

/// Observer callback invoked after a lifecycle transition.
pub type MatrixObserver = Arc<dyn Fn(&MatrixEvent) + Send + Sync + 'static>;

static MATRIX_OBSERVER: OnceLock<RwLock<Option<MatrixObserver>>> = OnceLock::new();

thread_local! {
    static IN_OBSERVER_CALLBACK: Cell<bool> = const { Cell::new(false) };
}

/// Install (or clear) the global matrix observer.
///
/// Returns the previously installed observer, if any.
pub fn set_matrix_observer(observer: Option<MatrixObserver>) -> Option<MatrixObserver> {
    let lock = MATRIX_OBSERVER.get_or_init(|| RwLock::new(None));
    let mut slot = lock.write().unwrap_or_else(|poisoned| poisoned.into_inner());
    std::mem::replace(&mut *slot, observer)
}

/// Report a lifecycle transition.
///
/// The event is logged at `trace` level when lifecycle tracing is enabled in
/// [`spiral_config::interop`], then forwarded to the installed observer.
/// Matrices created or dropped inside the observer do not re-enter it, and a
/// panicking observer is contained here.
pub fn emit_matrix_event(kind: MatrixEventKind, rows: usize, cols: usize) {
    if spiral_config::interop::trace_lifecycle() {
        tracing::trace!(target: "st_dense::lifecycle", event = kind.label(), rows, cols);
    }

    let Some(lock) = MATRIX_OBSERVER.get() else {
        return;
    };
    let observer = lock
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    let Some(observer) = observer else {
        return;
    };

    let already_in_callback = IN_OBSERVER_CALLBACK.with(|flag| flag.replace(true));
    if already_in_callback {
        return;
    }

    let event = MatrixEvent { kind, rows, cols };
    if catch_unwind(AssertUnwindSafe(|| observer(&event))).is_err() {
        tracing::warn!(event = kind.label(), "matrix observer panicked");
    }

    IN_OBSERVER_CALLBACK.with(|flag| flag.set(false));
}
