//! Runtime side of the plugin: getting deep links from the host to app code.
//!
//! [`Deeplinks`] ties a [`DeeplinkReceiver`] (the host entry point) to a
//! [`DeeplinkForwarder`] (ordered delivery to listeners). Construct it once
//! at startup and keep it for the lifetime of the app.
//!
//! ```ignore
//! let mut receiver = HostReceiver::with_native_bridge(Box::new(ios_bridge));
//! receiver.start();
//! let mut deeplinks = Deeplinks::init(receiver, ForwarderOptions::default());
//!
//! // later, from the platform layer
//! deeplinks.receiver_mut().on_deeplink("myapp://open?item=42");
//!
//! // app code; links that arrived earlier are replayed here
//! deeplinks.on_received(|link| println!("Received deeplink: {link}"));
//! ```
//!
//! Everything here is single-threaded: receiver and listeners run on the
//! host's main thread. Listeners must not subscribe or unsubscribe from
//! inside a callback.

pub mod forwarder;
pub mod receiver;

pub use forwarder::{DeeplinkForwarder, ForwarderOptions, ForwarderState, Listener, ListenerId};
pub use receiver::{DeeplinkHandler, DeeplinkReceiver, HostReceiver, NativeBridge, RECEIVER_NAME};

use std::cell::{Ref, RefCell};
use std::rc::Rc;

pub struct Deeplinks<R: DeeplinkReceiver> {
    forwarder: Rc<RefCell<DeeplinkForwarder>>,
    receiver: R,
}

impl<R: DeeplinkReceiver> Deeplinks<R> {
    /// Wire `receiver` to a fresh forwarder.
    pub fn init(mut receiver: R, options: ForwarderOptions) -> Self {
        tracing::debug!("Deeplinks init");
        let forwarder = Rc::new(RefCell::new(DeeplinkForwarder::new(options)));

        let sink = Rc::clone(&forwarder);
        receiver.set_handler(Box::new(move |link: &str| sink.borrow_mut().deliver(link)));

        Self {
            forwarder,
            receiver,
        }
    }

    /// Subscribe to received links. See [`DeeplinkForwarder::subscribe`].
    pub fn on_received<F>(&self, listener: F) -> ListenerId
    where
        F: FnMut(&str) + 'static,
    {
        self.forwarder.borrow_mut().subscribe(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.forwarder.borrow_mut().unsubscribe(id)
    }

    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    pub fn receiver_mut(&mut self) -> &mut R {
        &mut self.receiver
    }

    pub fn forwarder(&self) -> Ref<'_, DeeplinkForwarder> {
        self.forwarder.borrow()
    }
}
