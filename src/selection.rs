//! Session-scoped "selected region" slot with synchronous subscribers.

/// Handle returned by [`Selection::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

type Callback<T> = Box<dyn FnMut(Option<&T>)>;

/// Observable slot holding the currently selected value.
///
/// Writers replace the value with [`Selection::set`], which calls every
/// registered subscriber in registration order before returning.
pub struct Selection<T> {
    value: Option<T>,
    next_id: u64,
    subscribers: Vec<(SubscriptionToken, Callback<T>)>,
}

impl<T> Selection<T> {
    pub fn new() -> Self {
        Self {
            value: None,
            next_id: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Replaces the value (`None` clears it) and notifies subscribers.
    pub fn set(&mut self, value: Option<T>) {
        self.value = value;
        for (_, callback) in self.subscribers.iter_mut() {
            callback(self.value.as_ref());
        }
    }

    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionToken
    where
        F: FnMut(Option<&T>) + 'static,
    {
        let token = SubscriptionToken(self.next_id);
        self.next_id += 1;
        self.subscribers.push((token, Box::new(callback)));
        token
    }

    /// Removes a subscriber. Returns `false` if it was already removed.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(t, _)| *t != token);
        self.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Selection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("value", &self.value)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
