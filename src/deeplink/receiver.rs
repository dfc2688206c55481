//! The host-facing end of deep-link delivery.
//!
//! The platform layer (Android activity, iOS app delegate) calls
//! [`DeeplinkReceiver::on_deeplink`] with the raw URI whenever the app is
//! opened through its URL scheme. The receiver forwards to one installed
//! handler, normally a [`Deeplinks`](super::Deeplinks) forwarder.

/// Handler installed on a receiver.
pub type DeeplinkHandler = Box<dyn FnMut(&str)>;

/// Name the receiver registers under with native code.
pub const RECEIVER_NAME: &str = "[UnityDeeplinks]";

/// Inbound boundary for deep links.
pub trait DeeplinkReceiver {
    fn set_handler(&mut self, handler: DeeplinkHandler);
    fn on_deeplink(&mut self, link: &str);
}

/// Outbound registration with native code. Called once at startup on
/// platforms that need it (iOS).
#[cfg_attr(test, mockall::automock)]
pub trait NativeBridge {
    fn register(&mut self, receiver_name: &str);
}

/// The single receiver instance of a running app.
#[derive(Default)]
pub struct HostReceiver {
    handler: Option<DeeplinkHandler>,
    native: Option<Box<dyn NativeBridge>>,
    started: bool,
}

impl HostReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_native_bridge(native: Box<dyn NativeBridge>) -> Self {
        Self {
            native: Some(native),
            ..Self::default()
        }
    }

    /// Register with native code. Only the first call has an effect.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        if let Some(native) = self.native.as_mut() {
            tracing::debug!("Registering {} with native code", RECEIVER_NAME);
            native.register(RECEIVER_NAME);
        }
    }

    /// Tear down: drop the handler. Links received afterwards are discarded.
    pub fn destroy(&mut self) {
        self.handler = None;
    }

    pub fn has_handler(&self) -> bool {
        self.handler.is_some()
    }
}

impl DeeplinkReceiver for HostReceiver {
    /// Install the handler. A receiver keeps the first handler it gets until
    /// [`HostReceiver::destroy`].
    fn set_handler(&mut self, handler: DeeplinkHandler) {
        if self.handler.is_some() {
            tracing::warn!("Deeplink handler already set, ignoring replacement");
            return;
        }
        tracing::debug!("Set deeplink handler");
        self.handler = Some(handler);
    }

    fn on_deeplink(&mut self, link: &str) {
        tracing::debug!("OnDeeplink -> {}", link);
        match self.handler.as_mut() {
            Some(handler) => handler(link),
            None => tracing::warn!("Deeplink received without a handler: {}", link),
        }
    }
}
