// Deep-link event forwarder
//
// Links can arrive before any listener exists (the OS opens the app through
// a link and the host delivers it during startup). The forwarder holds them
// until the first listener subscribes, hands them over in arrival order, and
// from then on delivers straight to the attached listeners.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;

/// Callback invoked with every delivered link.
pub type Listener = Box<dyn FnMut(&str)>;

/// Handle returned by [`DeeplinkForwarder::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Delivery mode of the forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwarderState {
    /// No listener has attached yet; links are queued.
    NoListener,
    /// A listener has attached at least once; links go straight to listeners.
    HasListener,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ForwarderOptions {
    /// Percent-decode links before handing them out.
    pub decode_links: bool,
}

pub struct DeeplinkForwarder {
    options: ForwarderOptions,
    state: ForwarderState,
    pending: VecDeque<String>,
    listeners: Vec<(ListenerId, Listener)>,
    next_id: u64,
}

impl DeeplinkForwarder {
    pub fn new(options: ForwarderOptions) -> Self {
        Self {
            options,
            state: ForwarderState::NoListener,
            pending: VecDeque::new(),
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    /// Attach a listener.
    ///
    /// The first attach switches the forwarder to [`ForwarderState::HasListener`]
    /// and replays every queued link into the new listener, oldest first,
    /// before returning.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&str) + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        let mut listener: Listener = Box::new(listener);

        if self.state == ForwarderState::NoListener {
            self.state = ForwarderState::HasListener;
            if !self.pending.is_empty() {
                tracing::debug!("Flushing {} deferred deeplinks", self.pending.len());
            }
            while let Some(link) = self.pending.pop_front() {
                listener(&link);
            }
        }

        self.listeners.push((id, listener));
        id
    }

    /// Detach a listener. Returns whether it was attached.
    ///
    /// The forwarder stays in [`ForwarderState::HasListener`] even when the
    /// last listener leaves; links delivered meanwhile are dropped.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Entry point for links coming from the host.
    ///
    /// Listeners run synchronously in attachment order. A panicking listener
    /// unwinds through this call and the remaining listeners are not invoked.
    pub fn deliver(&mut self, link: &str) {
        let link = self.prepare(link);

        match self.state {
            ForwarderState::NoListener => {
                tracing::debug!("Deferring deeplink until a listener subscribes: {}", link);
                self.pending.push_back(link.into_owned());
            }
            ForwarderState::HasListener if self.listeners.is_empty() => {
                tracing::warn!("Deeplink received with no listener attached, dropping: {}", link);
            }
            ForwarderState::HasListener => {
                for (_, listener) in self.listeners.iter_mut() {
                    listener(&link);
                }
            }
        }
    }

    fn prepare<'a>(&self, link: &'a str) -> Cow<'a, str> {
        if !self.options.decode_links {
            return Cow::Borrowed(link);
        }

        match urlencoding::decode(link) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::debug!("Deeplink is not valid UTF-8 once decoded ({}), passing it through raw", e);
                Cow::Borrowed(link)
            }
        }
    }

    pub fn state(&self) -> ForwarderState {
        self.state
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for DeeplinkForwarder {
    fn default() -> Self {
        Self::new(ForwarderOptions::default())
    }
}

impl fmt::Debug for DeeplinkForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeeplinkForwarder")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("pending", &self.pending)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<String>>>, impl FnMut(&str) + 'static) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (log, move |link: &str| sink.borrow_mut().push(link.to_string()))
    }

    #[test]
    fn test_new_forwarder_queues() {
        let mut forwarder = DeeplinkForwarder::default();
        forwarder.deliver("app://one");
        forwarder.deliver("app://two");

        assert_eq!(forwarder.state(), ForwarderState::NoListener);
        assert_eq!(forwarder.pending_len(), 2);
    }

    #[test]
    fn test_first_subscribe_flushes_in_order() {
        let mut forwarder = DeeplinkForwarder::default();
        forwarder.deliver("app://one");
        forwarder.deliver("app://two");

        let (log, listener) = recorder();
        forwarder.subscribe(listener);

        assert_eq!(*log.borrow(), vec!["app://one", "app://two"]);
        assert_eq!(forwarder.pending_len(), 0);
        assert_eq!(forwarder.state(), ForwarderState::HasListener);

        forwarder.deliver("app://three");
        assert_eq!(*log.borrow(), vec!["app://one", "app://two", "app://three"]);
    }

    #[test]
    fn test_second_listener_gets_no_replay() {
        let mut forwarder = DeeplinkForwarder::default();
        forwarder.deliver("app://early");

        let (first, l1) = recorder();
        let (second, l2) = recorder();
        forwarder.subscribe(l1);
        forwarder.subscribe(l2);

        assert_eq!(first.borrow().len(), 1);
        assert!(second.borrow().is_empty());
    }

    #[test]
    fn test_delivery_in_attachment_order() {
        let mut forwarder = DeeplinkForwarder::default();
        let order = Rc::new(RefCell::new(Vec::new()));

        for name in ["a", "b", "c"] {
            let order = Rc::clone(&order);
            forwarder.subscribe(move |_: &str| order.borrow_mut().push(name));
        }

        forwarder.deliver("app://x");
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unsubscribe_all_drops_instead_of_requeueing() {
        let mut forwarder = DeeplinkForwarder::default();
        let (log, listener) = recorder();
        let id = forwarder.subscribe(listener);

        assert!(forwarder.unsubscribe(id));
        assert!(!forwarder.unsubscribe(id));

        forwarder.deliver("app://lost");
        assert_eq!(forwarder.pending_len(), 0);
        assert_eq!(forwarder.state(), ForwarderState::HasListener);

        let (late, late_listener) = recorder();
        forwarder.subscribe(late_listener);
        assert!(late.borrow().is_empty());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_decode_links() {
        let mut forwarder = DeeplinkForwarder::new(ForwarderOptions { decode_links: true });
        let (log, listener) = recorder();
        forwarder.subscribe(listener);

        forwarder.deliver("app://open?name=hello%20world");
        forwarder.deliver("app://bad%FF");

        assert_eq!(*log.borrow(), vec!["app://open?name=hello world", "app://bad%FF"]);
    }

    #[test]
    fn test_links_pass_through_untouched_by_default() {
        let mut forwarder = DeeplinkForwarder::default();
        let (log, listener) = recorder();
        forwarder.subscribe(listener);

        forwarder.deliver("not a url %20 at all");
        assert_eq!(*log.borrow(), vec!["not a url %20 at all"]);
    }

    #[test]
    #[should_panic(expected = "listener failed")]
    fn test_listener_panic_propagates() {
        let mut forwarder = DeeplinkForwarder::default();
        forwarder.subscribe(|_: &str| panic!("listener failed"));
        forwarder.deliver("app://boom");
    }

    proptest! {
        #[test]
        fn prop_queued_links_arrive_before_later_ones(
            early in proptest::collection::vec(".*", 0..20),
            late in proptest::collection::vec(".*", 0..20),
        ) {
            let mut forwarder = DeeplinkForwarder::default();
            for link in &early {
                forwarder.deliver(link);
            }

            let (log, listener) = recorder();
            forwarder.subscribe(listener);
            for link in &late {
                forwarder.deliver(link);
            }

            let expected: Vec<String> = early.iter().chain(late.iter()).cloned().collect();
            prop_assert_eq!(log.borrow().clone(), expected);
        }
    }
}
