//! Quality gates deciding whether a candidate answer ends the cascade.

/// Default minimum answer length, in characters.
pub const DEFAULT_QUALITY_THRESHOLD: usize = 100;

/// Predicate over a candidate answer.
pub trait QualityGate: Send + Sync {
    fn passes(&self, text: &str) -> bool;
}

/// Passes text strictly longer than `threshold` characters.
///
/// Deliberately crude: length stands in for "substantive". Stricter
/// policies plug in through [`QualityGate`] or [`FnGate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MinLengthGate {
    pub threshold: usize,
}

impl MinLengthGate {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }
}

impl Default for MinLengthGate {
    fn default() -> Self {
        Self::new(DEFAULT_QUALITY_THRESHOLD)
    }
}

impl QualityGate for MinLengthGate {
    fn passes(&self, text: &str) -> bool {
        text.chars().count() > self.threshold
    }
}

/// A gate backed by a closure.
///
/// ```ignore
/// let gate = FnGate::new(|text| text.contains("Austin"));
/// ```
pub struct FnGate<F>(F)
where
    F: Fn(&str) -> bool + Send + Sync;

impl<F> FnGate<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> QualityGate for FnGate<F>
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn passes(&self, text: &str) -> bool {
        (self.0)(text)
    }
}
