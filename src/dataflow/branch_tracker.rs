//! High-water mark over forward branch targets seen during a linear scan.
//!
//! A program point past every branch target observed so far can only be
//! reached by straight-line fall-through, which is what "unconditional" means
//! here. Backward branches are ignored on purpose: a loop-guarded point still
//! counts as unconditional. This is a linear-scan approximation, not a
//! dominator analysis.

/// Tracks the furthest forward branch target seen so far in one method.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BranchTracker {
    furthest_target: Option<u32>,
}

impl BranchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a conditional branch or unconditional jump target.
    pub fn observe_branch(&mut self, target: u32) {
        self.furthest_target = Some(match self.furthest_target {
            Some(current) => current.max(target),
            None => target,
        });
    }

    /// Record a switch by its default target, the escape path: when the mark
    /// already reaches past the default, it is pulled back to it.
    pub fn observe_switch_default(&mut self, default_target: u32) {
        if let Some(current) = self.furthest_target {
            if current > default_target {
                self.furthest_target = Some(default_target);
            }
        }
    }

    /// Whether `pc` lies past every branch target seen so far.
    pub fn is_unconditional(&self, pc: u32) -> bool {
        match self.furthest_target {
            Some(target) => pc > target,
            None => true,
        }
    }
}
