//! Ambient bitemporal options.
//!
//! Query and persistence operations consult a stack of option frames scoped
//! to the current thread of control. A frame is pushed for the dynamic
//! extent of one scoped block and popped on every exit path — normal
//! return, `?` propagation, or panic — via an RAII guard. The stack is
//! strictly thread-local: concurrent operations can never observe each
//! other's as-of context.
//!
//! Merge rule on push: when the previous top frame has its `force` flag
//! set, the previous frame wins for overlapping keys (an outer `valid_at!`
//! pins the instant for everything beneath it); otherwise the new options
//! win — ordinary innermost-wins nesting.

use bitempo_core::time::Instant;
use std::cell::RefCell;

/// One frame of ambient options. Every key is optional; an unset key defers
/// to the surrounding frame (already folded in at push time).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitemporalOptions {
    /// As-of instant for the valid axis.
    pub valid_at: Option<Instant>,
    /// As-of instant for the transaction axis.
    pub transaction_at: Option<Instant>,
    /// Remove valid-axis filtering entirely.
    pub ignore_valid: Option<bool>,
    /// Remove transaction-axis filtering entirely.
    pub ignore_transaction: Option<bool>,
    /// Rewrite-in-place mode for updates.
    pub force_update: Option<bool>,
    force: bool,
}

impl BitemporalOptions {
    /// Empty frame.
    pub fn new() -> Self {
        BitemporalOptions::default()
    }

    /// Set the valid-axis as-of instant.
    pub fn valid_at(mut self, t: Instant) -> Self {
        self.valid_at = Some(t);
        self
    }

    /// Set the transaction-axis as-of instant.
    pub fn transaction_at(mut self, t: Instant) -> Self {
        self.transaction_at = Some(t);
        self
    }

    /// Drop valid-axis filtering.
    pub fn ignore_valid(mut self) -> Self {
        self.ignore_valid = Some(true);
        self
    }

    /// Drop transaction-axis filtering.
    pub fn ignore_transaction(mut self) -> Self {
        self.ignore_transaction = Some(true);
        self
    }

    /// Request rewrite-in-place updates.
    pub fn force_update(mut self) -> Self {
        self.force_update = Some(true);
        self
    }

    /// Mark the frame as forcing: it takes precedence over explicit query
    /// arguments and over frames nested inside it.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Whether this frame claims force precedence.
    pub fn is_force(&self) -> bool {
        self.force
    }

    /// Fold `new` onto `self` (the current top), honoring the merge rule.
    fn merged_with(&self, new: &BitemporalOptions) -> BitemporalOptions {
        let (weak, strong) = if self.force { (new, self) } else { (self, new) };
        BitemporalOptions {
            valid_at: strong.valid_at.or(weak.valid_at),
            transaction_at: strong.transaction_at.or(weak.transaction_at),
            ignore_valid: strong.ignore_valid.or(weak.ignore_valid),
            ignore_transaction: strong.ignore_transaction.or(weak.ignore_transaction),
            force_update: strong.force_update.or(weak.force_update),
            force: self.force || new.force,
        }
    }
}

thread_local! {
    static STACK: RefCell<Vec<BitemporalOptions>> = const { RefCell::new(Vec::new()) };
}

/// Pops its frame when dropped. Not `Send`: frames belong to the thread
/// that pushed them.
#[derive(Debug)]
pub struct FrameGuard {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Push a frame merged over the current top; the returned guard pops it.
pub fn push(options: BitemporalOptions) -> FrameGuard {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let merged = match stack.last() {
            Some(top) => top.merged_with(&options),
            None => options,
        };
        stack.push(merged);
    });
    FrameGuard {
        _not_send: std::marker::PhantomData,
    }
}

/// The effective merged view for this thread; empty when no frame is
/// active.
pub fn current() -> BitemporalOptions {
    STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_default())
}

/// Current stack depth, for scoping assertions.
pub fn depth() -> usize {
    STACK.with(|stack| stack.borrow().len())
}

/// Run `f` with `options` folded onto the ambient stack.
pub fn with_options<R>(options: BitemporalOptions, f: impl FnOnce() -> R) -> R {
    let _guard = push(options);
    f()
}

/// Scope the valid-axis as-of instant.
pub fn valid_at<R>(t: Instant, f: impl FnOnce() -> R) -> R {
    with_options(BitemporalOptions::new().valid_at(t), f)
}

/// Scope the valid-axis as-of instant with force precedence: it overrides
/// explicit query-time arguments and nested frames.
pub fn valid_at_force<R>(t: Instant, f: impl FnOnce() -> R) -> R {
    with_options(BitemporalOptions::new().valid_at(t).force(), f)
}

/// Scope the transaction-axis as-of instant.
pub fn transaction_at<R>(t: Instant, f: impl FnOnce() -> R) -> R {
    with_options(BitemporalOptions::new().transaction_at(t), f)
}

/// Scope away valid-axis filtering.
pub fn ignore_valid_datetime<R>(f: impl FnOnce() -> R) -> R {
    with_options(BitemporalOptions::new().ignore_valid(), f)
}

/// Scope away transaction-axis filtering.
pub fn ignore_transaction_datetime<R>(f: impl FnOnce() -> R) -> R {
    with_options(BitemporalOptions::new().ignore_transaction(), f)
}

/// Scope updates into rewrite-in-place mode.
pub fn force_update_scope<R>(f: impl FnOnce() -> R) -> R {
    with_options(BitemporalOptions::new().force_update(), f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitempo_core::time::now;
    use chrono::Duration;

    #[test]
    fn empty_stack_yields_empty_options() {
        assert_eq!(depth(), 0);
        assert_eq!(current(), BitemporalOptions::new());
    }

    #[test]
    fn innermost_wins_without_force() {
        let t1 = now();
        let t2 = t1 + Duration::days(1);
        valid_at(t1, || {
            assert_eq!(current().valid_at, Some(t1));
            valid_at(t2, || {
                assert_eq!(current().valid_at, Some(t2), "inner frame wins");
            });
            assert_eq!(current().valid_at, Some(t1), "outer frame restored");
        });
        assert_eq!(depth(), 0);
    }

    #[test]
    fn outer_force_pins_overlapping_keys() {
        let t1 = now();
        let t2 = t1 + Duration::days(1);
        valid_at_force(t1, || {
            valid_at(t2, || {
                assert_eq!(current().valid_at, Some(t1), "outer force wins");
                assert!(current().is_force());
            });
        });
    }

    #[test]
    fn force_does_not_pin_disjoint_keys() {
        let t1 = now();
        valid_at_force(t1, || {
            transaction_at(t1, || {
                let opts = current();
                assert_eq!(opts.valid_at, Some(t1));
                assert_eq!(opts.transaction_at, Some(t1), "disjoint key from inner frame");
            });
        });
    }

    #[test]
    fn frames_merge_across_nesting() {
        let t = now();
        valid_at(t, || {
            ignore_transaction_datetime(|| {
                let opts = current();
                assert_eq!(opts.valid_at, Some(t), "outer key still visible");
                assert_eq!(opts.ignore_transaction, Some(true));
            });
        });
    }

    #[test]
    fn panic_inside_block_still_pops_the_frame() {
        let t = now();
        let result = std::panic::catch_unwind(|| {
            valid_at(t, || {
                panic!("boom");
            })
        });
        assert!(result.is_err());
        assert_eq!(depth(), 0, "frame popped on unwind");
        assert_eq!(current().valid_at, None);
    }

    #[test]
    fn early_error_return_pops_the_frame() {
        fn inner() -> Result<(), String> {
            valid_at(now(), || Err::<(), _>("bail".to_string()))
        }
        assert!(inner().is_err());
        assert_eq!(depth(), 0);
    }

    #[test]
    fn threads_do_not_share_frames() {
        let t = now();
        valid_at(t, || {
            let handle = std::thread::spawn(|| current().valid_at);
            assert_eq!(handle.join().unwrap(), None, "other thread sees no frame");
        });
    }
}
