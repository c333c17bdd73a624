//! Section visibility to ambient play/pause decisions
//!
//! The page reports whether each watched section is on screen; the router
//! answers only when the "any watched section visible" answer flips, so
//! scrolling between two ambient sections never restarts the loop.

use std::collections::BTreeSet;

use tracing::trace;

/// What the ambient channel should do after a visibility report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbientDirective {
    /// A watched section came into view.
    Play,
    /// The last visible watched section left the view.
    Pause,
}

/// Tracks which watched sections are visible.
#[derive(Debug, Clone)]
pub struct VisibilityRouter {
    sections: BTreeSet<String>,
    visible: BTreeSet<String>,
    threshold: f64,
}

impl VisibilityRouter {
    /// Watch `sections`; a section counts as visible at `threshold` ratio.
    pub fn new(sections: impl IntoIterator<Item = impl Into<String>>, threshold: f64) -> Self {
        Self {
            sections: sections.into_iter().map(Into::into).collect(),
            visible: BTreeSet::new(),
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// Watched section ids.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(String::as_str)
    }

    /// Visible fraction a section needs.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// True if `section` is watched.
    pub fn watches(&self, section: &str) -> bool {
        self.sections.contains(section)
    }

    /// True if any watched section is visible.
    pub fn any_visible(&self) -> bool {
        !self.visible.is_empty()
    }

    /// Record a visibility boolean for a section.
    pub fn report(&mut self, section: &str, visible: bool) -> Option<AmbientDirective> {
        if !self.watches(section) {
            trace!(section, "visibility report for unwatched section");
            return None;
        }
        let before = self.any_visible();
        if visible {
            self.visible.insert(section.to_string());
        } else {
            self.visible.remove(section);
        }
        match (before, self.any_visible()) {
            (false, true) => Some(AmbientDirective::Play),
            (true, false) => Some(AmbientDirective::Pause),
            _ => None,
        }
    }

    /// Record an intersection ratio for a section.
    pub fn report_ratio(&mut self, section: &str, ratio: f64) -> Option<AmbientDirective> {
        let visible = ratio > 0.0 && ratio >= self.threshold;
        self.report(section, visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> VisibilityRouter {
        VisibilityRouter::new(["wonderworks-intro", "wonderworks-wrapper"], 0.3)
    }

    #[test]
    fn test_transitions_only_on_flip() {
        let mut r = router();
        assert_eq!(r.report("wonderworks-intro", true), Some(AmbientDirective::Play));
        assert_eq!(r.report("wonderworks-wrapper", true), None);
        assert_eq!(r.report("wonderworks-intro", false), None);
        assert_eq!(r.report("wonderworks-wrapper", false), Some(AmbientDirective::Pause));
        assert_eq!(r.report("wonderworks-wrapper", false), None);
    }

    #[test]
    fn test_unwatched_sections_are_ignored() {
        let mut r = router();
        assert_eq!(r.report("contact", true), None);
        assert!(!r.any_visible());
    }

    #[test]
    fn test_ratio_threshold() {
        let mut r = router();
        assert_eq!(r.report_ratio("wonderworks-intro", 0.1), None);
        assert_eq!(
            r.report_ratio("wonderworks-intro", 0.3),
            Some(AmbientDirective::Play)
        );
        assert_eq!(
            r.report_ratio("wonderworks-intro", 0.29),
            Some(AmbientDirective::Pause)
        );
    }
}
