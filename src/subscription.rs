use std::mem::take;

/// Keeps a subscriber registered. Dropping it unsubscribes.
#[derive(Default)]
#[must_use]
pub struct Subscription(RawSubscription);

impl Subscription {
    pub fn empty() -> Self {
        Subscription(RawSubscription::Empty)
    }
    pub fn from_fn(unsubscribe: impl FnOnce() + 'static) -> Self {
        Subscription(RawSubscription::Fn(Box::new(unsubscribe)))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.0, RawSubscription::Empty)
    }

    /// Unsubscribes now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        match take(&mut self.0) {
            RawSubscription::Empty => {}
            RawSubscription::Fn(f) => f(),
        }
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            RawSubscription::Empty => write!(f, "Subscription(empty)"),
            _ => write!(f, "Subscription"),
        }
    }
}

#[derive(Default)]
enum RawSubscription {
    #[default]
    Empty,
    Fn(Box<dyn FnOnce() + 'static>),
}
