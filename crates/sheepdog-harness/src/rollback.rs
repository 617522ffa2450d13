//! Ordered release of partially acquired resources.
//!
//! Multi-step setup (image file, mount point, mount, sheep process) pushes
//! one undo step per acquired resource onto a [`Rollback`]. If setup
//! returns early the guard drops and undoes every step, newest first. A
//! completed setup calls [`Rollback::commit`] and ownership passes to the
//! caller's explicit teardown.

use tracing::{debug, warn};

use crate::error::HarnessResult;

type Undo<'a> = Box<dyn FnOnce() -> HarnessResult<()> + 'a>;

/// Stack of undo steps run in reverse order on drop.
///
/// A failing step is logged and the remaining steps still run; the error
/// that triggered the rollback is what the caller sees.
#[must_use = "dropping a Rollback immediately undoes every step"]
pub struct Rollback<'a> {
    steps: Vec<(String, Undo<'a>)>,
}

impl<'a> Rollback<'a> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Register the release of a resource that was just acquired.
    pub fn push<F>(&mut self, label: impl Into<String>, undo: F)
    where
        F: FnOnce() -> HarnessResult<()> + 'a,
    {
        self.steps.push((label.into(), Box::new(undo)));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Setup finished: keep every resource.
    pub fn commit(mut self) {
        self.steps.clear();
    }
}

impl Default for Rollback<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        while let Some((label, undo)) = self.steps.pop() {
            debug!("rollback: {}", label);
            if let Err(e) = undo() {
                warn!("rollback step '{}' failed: {}", label, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use std::cell::RefCell;

    #[test]
    fn test_rollback_runs_in_reverse() {
        let log = RefCell::new(Vec::new());
        {
            let mut rb = Rollback::new();
            rb.push("first", || {
                log.borrow_mut().push(1);
                Ok(())
            });
            rb.push("second", || {
                log.borrow_mut().push(2);
                Ok(())
            });
            assert_eq!(rb.len(), 2);
        }
        assert_eq!(*log.borrow(), vec![2, 1]);
    }

    #[test]
    fn test_commit_keeps_resources() {
        let log = RefCell::new(Vec::new());
        let mut rb = Rollback::new();
        rb.push("only", || {
            log.borrow_mut().push(1);
            Ok(())
        });
        rb.commit();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_failed_step_does_not_stop_the_rest() {
        let log = RefCell::new(Vec::new());
        {
            let mut rb = Rollback::new();
            rb.push("outer", || {
                log.borrow_mut().push("outer");
                Ok(())
            });
            rb.push("stuck mount", || {
                log.borrow_mut().push("stuck");
                Err(HarnessError::InvalidArgument("busy".into()))
            });
        }
        assert_eq!(*log.borrow(), vec!["stuck", "outer"]);
    }
}
