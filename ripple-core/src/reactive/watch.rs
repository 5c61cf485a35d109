//! Watchers
//!
//! A watcher runs a callback with the new and previous value of a source
//! every time the source changes.
//!
//! # How Watchers Work
//!
//! 1. The source becomes a getter: a signal is read (shallow), an observed
//!    object is traversed, a function is called as is.
//! 2. The getter is the body of a lazy effect. Its scheduler is the watch
//!    job: run the previous cleanup, re-run the getter, call the callback
//!    with `(new, old, on_cleanup)`, remember `new` as `old`.
//! 3. Without `immediate`, setup only records the first value.
//!
//! # Depth
//!
//! Traversal reads every nested property, element and boxed value so that
//! the getter depends on all of them. See [`Deep`] for how deep it goes.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::effect::{Effect, Stop};
use super::memo::Memo;
use super::observed::{FieldRef, Object, Observed, Value};
use super::signal::Signal;
use super::store::TargetId;
use crate::graph::NodeId;

/// How deep a watcher traverses its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deep {
    /// One level: only the direct properties of an observed object.
    Off,
    /// At most this many levels. `Levels(0)` behaves like [`Deep::Off`] on
    /// observed objects.
    Levels(usize),
    /// Every level.
    Unbounded,
}

/// Options for [`watch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    /// Call the callback once during setup, with no previous value.
    pub immediate: bool,
    /// Traversal depth. Observed sources default to [`Deep::Unbounded`],
    /// other sources to no traversal.
    pub deep: Option<Deep>,
    /// Stop after the first callback.
    pub once: bool,
}

impl WatchOptions {
    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    pub fn deep(mut self, deep: Deep) -> Self {
        self.deep = Some(deep);
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }
}

/// Targets and nodes already visited by one traversal.
#[derive(Debug, Default)]
pub struct Seen {
    targets: HashSet<TargetId>,
    nodes: HashSet<NodeId>,
}

impl Seen {
    fn first_visit_target(&mut self, target: TargetId) -> bool {
        self.targets.insert(target)
    }

    fn first_visit_node(&mut self, node: NodeId) -> bool {
        self.nodes.insert(node)
    }
}

/// Values a watcher can traverse to depend on everything they contain.
///
/// `depth` is the number of levels still allowed; nothing is read at zero.
pub trait Traverse {
    fn traverse(&self, depth: usize, seen: &mut Seen);
}

macro_rules! impl_traverse_leaf {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Traverse for $ty {
                fn traverse(&self, _depth: usize, _seen: &mut Seen) {}
            }
        )*
    };
}

impl_traverse_leaf!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String, &'static str, Rc<str>, Object,
);

impl Traverse for Observed {
    fn traverse(&self, depth: usize, seen: &mut Seen) {
        if depth == 0 || !seen.first_visit_target(self.target_id()) {
            return;
        }
        for key in self.keys() {
            self.get(key).traverse(depth - 1, seen);
        }
    }
}

impl Traverse for Value {
    fn traverse(&self, depth: usize, seen: &mut Seen) {
        match self {
            Value::Observed(observed) => observed.traverse(depth, seen),
            Value::Boxed(cell) => cell.traverse(depth, seen),
            _ => {}
        }
    }
}

impl<T: Traverse + 'static> Traverse for Signal<T> {
    fn traverse(&self, depth: usize, seen: &mut Seen) {
        if depth == 0 || !seen.first_visit_node(self.id()) {
            return;
        }
        self.with(|value| value.traverse(depth - 1, seen));
    }
}

impl<T: Traverse + PartialEq + 'static> Traverse for Memo<T> {
    fn traverse(&self, depth: usize, seen: &mut Seen) {
        if depth == 0 || !seen.first_visit_node(self.id()) {
            return;
        }
        self.with(|value| value.traverse(depth - 1, seen));
    }
}

impl<T: Traverse> Traverse for Option<T> {
    fn traverse(&self, depth: usize, seen: &mut Seen) {
        if let Some(value) = self {
            value.traverse(depth, seen);
        }
    }
}

impl<T: Traverse> Traverse for Vec<T> {
    fn traverse(&self, depth: usize, seen: &mut Seen) {
        if depth == 0 {
            return;
        }
        for item in self {
            item.traverse(depth - 1, seen);
        }
    }
}

macro_rules! impl_traverse_tuple {
    ($($name:ident),+) => {
        impl<$($name: Traverse),+> Traverse for ($($name,)+) {
            #[allow(non_snake_case)]
            fn traverse(&self, depth: usize, seen: &mut Seen) {
                if depth == 0 {
                    return;
                }
                let ($($name,)+) = self;
                $($name.traverse(depth - 1, seen);)+
            }
        }
    };
}

impl_traverse_tuple!(A, B);
impl_traverse_tuple!(A, B, C);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Boxed,
    Observed,
    Getter,
}

/// What a watcher reads.
pub struct WatchSource<T> {
    getter: Box<dyn Fn() -> T>,
    kind: SourceKind,
}

impl<T> WatchSource<T> {
    /// Watch whatever `getter` reads.
    pub fn getter(getter: impl Fn() -> T + 'static) -> Self {
        Self {
            getter: Box::new(getter),
            kind: SourceKind::Getter,
        }
    }

    /// Levels to traverse, or `None` for no traversal.
    fn depth(&self, deep: Option<Deep>) -> Option<usize> {
        match (self.kind, deep) {
            (SourceKind::Observed, None) => Some(usize::MAX),
            (SourceKind::Observed, Some(Deep::Off | Deep::Levels(0))) => Some(1),
            (_, Some(Deep::Unbounded)) => Some(usize::MAX),
            (_, Some(Deep::Levels(n))) if n > 0 => Some(n),
            _ => None,
        }
    }
}

impl<T: Clone + 'static> From<Signal<T>> for WatchSource<T> {
    fn from(signal: Signal<T>) -> Self {
        Self {
            getter: Box::new(move || signal.get()),
            kind: SourceKind::Boxed,
        }
    }
}

impl<T: Clone + PartialEq + 'static> From<Memo<T>> for WatchSource<T> {
    fn from(memo: Memo<T>) -> Self {
        Self {
            getter: Box::new(move || memo.get()),
            kind: SourceKind::Boxed,
        }
    }
}

impl From<FieldRef> for WatchSource<Value> {
    fn from(field: FieldRef) -> Self {
        Self {
            getter: Box::new(move || field.get()),
            kind: SourceKind::Boxed,
        }
    }
}

impl From<Observed> for WatchSource<Observed> {
    fn from(observed: Observed) -> Self {
        Self {
            getter: Box::new(move || observed.clone()),
            kind: SourceKind::Observed,
        }
    }
}

type Cleanup = Box<dyn FnOnce()>;

/// Registers the cleanup that runs before the next callback, or when the
/// watcher stops.
#[derive(Clone, Default)]
pub struct OnCleanup {
    slot: Rc<RefCell<Option<Cleanup>>>,
}

impl OnCleanup {
    /// Replace the pending cleanup.
    pub fn register(&self, cleanup: impl FnOnce() + 'static) {
        *self.slot.borrow_mut() = Some(Box::new(cleanup));
    }

    fn run(&self) {
        let pending = self.slot.borrow_mut().take();
        if let Some(cleanup) = pending {
            cleanup();
        }
    }
}

type Callback<T> = Box<dyn FnMut(&T, Option<&T>, &OnCleanup)>;

struct WatchState<T> {
    callback: RefCell<Callback<T>>,
    old: RefCell<Option<T>>,
    cleanup: OnCleanup,
    once: bool,
}

impl<T: 'static> WatchState<T> {
    /// Re-read the source and call back. Unless `force`d, does nothing when
    /// no dependency changed, which includes memos that recomputed to the
    /// same value.
    fn job(&self, effect: &Effect<T>, force: bool) {
        if !force && !effect.is_dirty() {
            return;
        }
        self.cleanup.run();
        let new = effect.run();

        let Ok(mut callback) = self.callback.try_borrow_mut() else {
            tracing::debug!(effect = ?effect.id(), "watch callback re-entered, skipped");
            return;
        };
        let old = self.old.borrow_mut().take();
        callback(&new, old.as_ref(), &self.cleanup);
        drop(callback);
        *self.old.borrow_mut() = Some(new);

        if self.once {
            effect.stop();
        }
    }
}

/// Stops a watcher. Dropping the handle stops it too.
#[must_use = "dropping the handle stops the watcher"]
pub struct WatchHandle {
    effect: Box<dyn Stop>,
    cleanup: OnCleanup,
}

impl WatchHandle {
    /// Stop watching and run the pending cleanup. Idempotent.
    pub fn stop(&self) {
        self.effect.stop();
        self.cleanup.run();
    }

    pub fn is_active(&self) -> bool {
        self.effect.is_active()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Call `callback(new, old, on_cleanup)` whenever `source` changes.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{watch, Signal, WatchOptions};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let count = Signal::new(1);
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let handle = {
///     let seen = seen.clone();
///     watch(
///         count.clone(),
///         move |new, old, _| seen.borrow_mut().push((*new, old.copied())),
///         WatchOptions::default(),
///     )
/// };
///
/// count.set(2);
/// assert_eq!(*seen.borrow(), vec![(2, Some(1))]);
///
/// handle.stop();
/// count.set(3);
/// assert_eq!(seen.borrow().len(), 1);
/// ```
pub fn watch<T, S, F>(source: S, callback: F, options: WatchOptions) -> WatchHandle
where
    T: Traverse + 'static,
    S: Into<WatchSource<T>>,
    F: FnMut(&T, Option<&T>, &OnCleanup) + 'static,
{
    let source = source.into();
    let depth = source.depth(options.deep);
    let getter = source.getter;

    let effect = Effect::new_lazy(move || {
        let value = getter();
        if let Some(depth) = depth {
            value.traverse(depth, &mut Seen::default());
        }
        value
    });

    let state = Rc::new(WatchState {
        callback: RefCell::new(Box::new(callback)),
        old: RefCell::new(None),
        cleanup: OnCleanup::default(),
        once: options.once,
    });
    {
        let state = state.clone();
        effect.set_scheduler(move |effect| state.job(effect, false));
    }

    tracing::trace!(effect = ?effect.id(), ?depth, immediate = options.immediate, "watch");
    if options.immediate {
        state.job(&effect, true);
    } else {
        *state.old.borrow_mut() = Some(effect.run());
    }

    WatchHandle {
        cleanup: state.cleanup.clone(),
        effect: Box::new(effect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::observe;
    use serde_json::json;
    use std::cell::Cell;

    fn count_calls() -> (Rc<Cell<usize>>, impl FnMut(&Observed, Option<&Observed>, &OnCleanup)) {
        let calls = Rc::new(Cell::new(0));
        let callback = {
            let calls = calls.clone();
            move |_: &Observed, _: Option<&Observed>, _: &OnCleanup| calls.set(calls.get() + 1)
        };
        (calls, callback)
    }

    fn nested() -> Observed {
        observe(&Object::from_json(json!({ "a": { "b": 1 } })))
    }

    #[test]
    fn observed_sources_are_deep_by_default() {
        let state = nested();
        let (calls, callback) = count_calls();
        let _handle = watch(state.clone(), callback, WatchOptions::default());

        let inner = state.get("a");
        inner.as_observed().unwrap().set("b", 2).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn shallow_watch_sees_only_direct_properties() {
        let state = nested();
        let (calls, callback) = count_calls();
        let _handle = watch(
            state.clone(),
            callback,
            WatchOptions::default().deep(Deep::Off),
        );

        let inner = state.get("a");
        inner.as_observed().unwrap().set("b", 2).unwrap();
        assert_eq!(calls.get(), 0);

        state.set("a", Object::new()).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn level_zero_is_shallow_on_observed_sources() {
        let state = nested();
        let (calls, callback) = count_calls();
        let _handle = watch(
            state.clone(),
            callback,
            WatchOptions::default().deep(Deep::Levels(0)),
        );

        state.get("a").as_observed().unwrap().set("b", 5).unwrap();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn deep_getter_traverses_its_result() {
        let state = nested();
        let calls = Rc::new(Cell::new(0));
        let _handle = {
            let (state, calls) = (state.clone(), calls.clone());
            watch(
                WatchSource::getter(move || state.get("a")),
                move |_, _, _| calls.set(calls.get() + 1),
                WatchOptions::default().deep(Deep::Unbounded),
            )
        };

        state.get("a").as_observed().unwrap().set("b", 3).unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn cyclic_objects_are_traversed_once() {
        let state = observe(&Object::new());
        state.set("me", state.clone()).unwrap();

        let (calls, callback) = count_calls();
        let _handle = watch(state.clone(), callback, WatchOptions::default());

        state.set("x", 1).unwrap();
        assert_eq!(calls.get(), 1);
        state.remove("me").unwrap();
    }

    #[test]
    fn lazy_watch_waits_for_a_change() {
        let signal = Signal::new(1);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let _handle = {
            let calls = calls.clone();
            watch(
                signal.clone(),
                move |new, old, _| calls.borrow_mut().push((*new, old.copied())),
                WatchOptions::default(),
            )
        };
        assert!(calls.borrow().is_empty());

        signal.set(2);
        signal.set(3);
        assert_eq!(*calls.borrow(), vec![(2, Some(1)), (3, Some(2))]);
    }

    #[test]
    fn immediate_watch_fires_at_setup() {
        let signal = Signal::new(1);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let _handle = {
            let calls = calls.clone();
            watch(
                signal.clone(),
                move |new, old, _| calls.borrow_mut().push((*new, old.copied())),
                WatchOptions::default().immediate(),
            )
        };
        assert_eq!(*calls.borrow(), vec![(1, None)]);

        signal.set(2);
        assert_eq!(calls.borrow()[1], (2, Some(1)));
    }

    #[test]
    fn once_stops_after_the_first_callback() {
        let signal = Signal::new(0);
        let calls = Rc::new(Cell::new(0));
        let handle = {
            let calls = calls.clone();
            watch(
                signal.clone(),
                move |_, _, _| calls.set(calls.get() + 1),
                WatchOptions::default().once(),
            )
        };

        signal.set(1);
        signal.set(2);
        assert_eq!(calls.get(), 1);
        assert!(!handle.is_active());
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn cleanup_runs_before_the_next_callback_and_on_stop() {
        let signal = Signal::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let handle = {
            let log = log.clone();
            watch(
                signal.clone(),
                move |new: &i32, _, on_cleanup| {
                    log.borrow_mut().push(format!("run {new}"));
                    let log = log.clone();
                    let new = *new;
                    on_cleanup.register(move || log.borrow_mut().push(format!("cleanup {new}")));
                },
                WatchOptions::default(),
            )
        };

        signal.set(1);
        signal.set(2);
        handle.stop();
        handle.stop();

        assert_eq!(
            *log.borrow(),
            vec!["run 1", "cleanup 1", "run 2", "cleanup 2"]
        );
    }

    #[test]
    fn dropping_the_handle_stops_the_watcher() {
        let signal = Signal::new(0);
        let calls = Rc::new(Cell::new(0));
        {
            let calls = calls.clone();
            let _handle = watch(
                signal.clone(),
                move |_, _, _| calls.set(calls.get() + 1),
                WatchOptions::default(),
            );
        }

        signal.set(1);
        assert_eq!(calls.get(), 0);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn memo_source_calls_back_only_when_its_value_changes() {
        let number = Signal::new(2);
        let parity = {
            let number = number.clone();
            Memo::new(move || number.get() % 2 == 0)
        };
        let seen = Rc::new(RefCell::new(Vec::new()));
        let _handle = {
            let seen = seen.clone();
            watch(
                parity,
                move |new: &bool, old: Option<&bool>, _| {
                    seen.borrow_mut().push((*new, old.copied()))
                },
                WatchOptions::default(),
            )
        };

        number.set(4);
        assert!(seen.borrow().is_empty());

        number.set(5);
        assert_eq!(*seen.borrow(), vec![(false, Some(true))]);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: WatchOptions =
            serde_json::from_value(json!({ "deep": { "levels": 2 } })).unwrap();
        assert_eq!(
            options,
            WatchOptions {
                immediate: false,
                deep: Some(Deep::Levels(2)),
                once: false,
            }
        );
    }
}
