// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Routine factories: a body builder plus the data source that wakes it.

use super::routine::{set_current_state, yield_now, yield_with_state, RoutineFunc, RoutineState};
use crate::data::{DataVisitor, NotifySource};
use std::fmt;
use std::sync::Arc;

type BodyBuilder = Box<dyn Fn() -> RoutineFunc + Send + Sync>;

/// Builds routine bodies, optionally bound to a data source.
pub struct RoutineFactory {
    create_routine: BodyBuilder,
    data_visitor: Option<Arc<dyn NotifySource>>,
}

impl RoutineFactory {
    /// Factory for a plain body with no data source.
    pub fn from_fn<F>(func: F) -> Self
    where
        F: FnMut() + Clone + Send + Sync + 'static,
    {
        Self {
            create_routine: Box::new(move || Box::new(func.clone()) as RoutineFunc),
            data_visitor: None,
        }
    }

    /// Factory for a data-driven body.
    ///
    /// The body parks in DATA_WAIT, runs `callback` for every message
    /// `visitor` hands out and yields READY after each one, so a burst of
    /// messages drains one per resume.
    pub fn from_visitor<M, F, V>(callback: F, visitor: Arc<V>) -> Self
    where
        M: 'static,
        F: FnMut(M) + Clone + Send + Sync + 'static,
        V: DataVisitor<M> + 'static,
    {
        let source = Arc::clone(&visitor);
        let create_routine = move || {
            let visitor = Arc::clone(&source);
            let mut callback = callback.clone();
            Box::new(move || drain_visitor::<M, V, F>(visitor.as_ref(), &mut callback)) as RoutineFunc
        };
        Self {
            create_routine: Box::new(create_routine),
            data_visitor: Some(visitor as Arc<dyn NotifySource>),
        }
    }

    /// Build a fresh body.
    pub fn create_routine(&self) -> RoutineFunc {
        (self.create_routine)()
    }

    pub fn data_visitor(&self) -> Option<Arc<dyn NotifySource>> {
        self.data_visitor.clone()
    }
}

impl fmt::Debug for RoutineFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutineFactory")
            .field("has_visitor", &self.data_visitor.is_some())
            .finish()
    }
}

fn drain_visitor<M, V, F>(visitor: &V, callback: &mut F)
where
    V: DataVisitor<M> + ?Sized,
    F: FnMut(M),
{
    loop {
        set_current_state(RoutineState::DataWait);
        match visitor.try_fetch() {
            Some(msg) => {
                callback(msg);
                yield_with_state(RoutineState::Ready);
            }
            None => yield_now(),
        }
    }
}
