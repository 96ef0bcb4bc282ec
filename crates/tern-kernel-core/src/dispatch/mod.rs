//! Module call dispatch
//!
//! Every call a module makes arrives here as a request identifier plus
//! three parameter words. Core requests are looked up in the static
//! [`table::DISPATCH_TABLE`], validated against the calling module with the
//! entry's policy, and only then handed to the entry's handler. Anything
//! else is routed to an installed extension or application handler.
//!
//! ```text
//!   module thread ── request, p0, p1, p2 ──▶ module_call
//!                                              │
//!                  ┌───────────────────────────┼──────────────────────┐
//!                  ▼                           ▼                      ▼
//!          core request (1..=96)      extension range         application range
//!          policy::validate           ExternalDispatch        ApplicationDispatch
//!          handler ──▶ primitive
//! ```

pub mod handlers;
pub mod policy;
pub mod request;
pub mod table;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;

use crate::notify;
use crate::state::KernelState;
use crate::status::{Completion, Status};
use crate::types::ModuleId;

pub use request::APPLICATION_REQUEST_BASE;

/// A validated call, as seen by a handler.
#[derive(Clone, Copy, Debug)]
pub struct Call<'a> {
    pub module: ModuleId,
    pub request: u32,
    pub params: [u32; 3],
    /// Extra parameter words read by the policy (empty if none)
    pub extra: &'a [u32],
}

impl Call<'_> {
    pub fn p0(&self) -> u32 {
        self.params[0]
    }

    pub fn p1(&self) -> u32 {
        self.params[1]
    }

    pub fn p2(&self) -> u32 {
        self.params[2]
    }

    /// Extra parameter `i`, or zero if the policy read fewer.
    pub fn extra(&self, i: usize) -> u32 {
        self.extra.get(i).copied().unwrap_or(0)
    }
}

pub type Handler = fn(&mut KernelState, &Call<'_>) -> Completion;

// ============================================================================
// Extensions
// ============================================================================

/// An external component with its own request range.
///
/// The component validates its own parameters.
pub trait ExternalDispatch {
    fn dispatch(&mut self, module: ModuleId, request: u32, params: [u32; 3]) -> u32;

    /// Release everything the component holds for a stopping module.
    fn stop(&mut self, module: ModuleId);
}

/// Handler for application-defined requests.
pub trait ApplicationDispatch {
    /// `request` is rebased so the first application request is zero.
    fn dispatch(&mut self, request: u32, params: [u32; 3]) -> u32;
}

/// Request ranges forwarded to external components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExtensionRange {
    Port,
    FileSystem,
    Network,
    NetworkDuo,
    Usb,
    Graphics,
}

impl ExtensionRange {
    pub const ALL: [ExtensionRange; 6] = [
        ExtensionRange::Port,
        ExtensionRange::FileSystem,
        ExtensionRange::Network,
        ExtensionRange::NetworkDuo,
        ExtensionRange::Usb,
        ExtensionRange::Graphics,
    ];

    /// First and last request of the range, inclusive.
    pub fn bounds(self) -> (u32, u32) {
        use request::*;
        match self {
            ExtensionRange::Port => (PORT_EXTENSION_START, PORT_EXTENSION_END),
            ExtensionRange::FileSystem => (FILE_SYSTEM_START, FILE_SYSTEM_END),
            ExtensionRange::Network => (NETWORK_START, NETWORK_END),
            ExtensionRange::NetworkDuo => (NETWORK_DUO_START, NETWORK_DUO_END),
            ExtensionRange::Usb => (USB_START, USB_END),
            ExtensionRange::Graphics => (GRAPHICS_START, GRAPHICS_END),
        }
    }

    pub fn for_request(request: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|r| {
            let (start, end) = r.bounds();
            (start..=end).contains(&request)
        })
    }
}

/// Installed extension and application handlers.
#[derive(Default)]
pub struct Extensions {
    handlers: BTreeMap<ExtensionRange, Box<dyn ExternalDispatch>>,
    application: Option<Box<dyn ApplicationDispatch>>,
}

impl Extensions {
    /// Install a component for `range`, returning any it replaces.
    pub fn install(
        &mut self,
        range: ExtensionRange,
        handler: Box<dyn ExternalDispatch>,
    ) -> Option<Box<dyn ExternalDispatch>> {
        self.handlers.insert(range, handler)
    }

    pub fn install_application(&mut self, handler: Box<dyn ApplicationDispatch>) {
        self.application = Some(handler);
    }

    pub fn is_installed(&self, range: ExtensionRange) -> bool {
        self.handlers.contains_key(&range)
    }

    /// Tell every installed component that `module` is stopping.
    pub fn stop_all(&mut self, module: ModuleId) {
        for handler in self.handlers.values_mut() {
            handler.stop(module);
        }
    }

    fn route(&mut self, module: ModuleId, request: u32, params: [u32; 3]) -> Completion {
        if request >= APPLICATION_REQUEST_BASE {
            return match self.application.as_mut() {
                Some(app) => Completion::Return(app.dispatch(request - APPLICATION_REQUEST_BASE, params)),
                None => Status::NotAvailable.into(),
            };
        }
        match ExtensionRange::for_request(request).and_then(|r| self.handlers.get_mut(&r)) {
            Some(handler) => Completion::Return(handler.dispatch(module, request, params)),
            None => Status::NotAvailable.into(),
        }
    }
}

// ============================================================================
// Entry point
// ============================================================================

/// Module associated with the calling thread.
pub fn calling_module(state: &KernelState) -> Option<ModuleId> {
    state.current_thread.and_then(|t| state.thread_module(t))
}

/// Execute one module call on behalf of the current thread.
///
/// A failed check returns its status without reaching the primitive.
/// Notifications raised by the call are delivered before returning.
pub fn module_call(state: &mut KernelState, request: u32, params: [u32; 3]) -> Completion {
    let Some(module) = calling_module(state) else {
        return Status::Invalid.into();
    };
    let completion = match table::lookup(request) {
        Some(entry) => {
            let validated = match state.module(module) {
                Some(instance) => policy::validate(state, instance, entry.checks, params),
                None => Err(Status::Invalid),
            };
            match validated {
                Ok(extra) => {
                    let call = Call {
                        module,
                        request,
                        params,
                        extra: &extra,
                    };
                    (entry.handler)(state, &call)
                }
                Err(status) => status.into(),
            }
        }
        None => state.extensions.route(module, request, params),
    };
    notify::drain(state);
    completion
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{spawn_current, state};
    use alloc::rc::Rc;
    use core::cell::RefCell;

    #[test]
    fn test_no_module_context_is_invalid() {
        let mut s = state();
        assert_eq!(module_call(&mut s, request::TIME_GET, [0; 3]), Completion::from(Status::Invalid));
        spawn_current(&mut s);
        assert_eq!(module_call(&mut s, request::TIME_GET, [0; 3]), Completion::from(Status::Invalid));
    }

    #[test]
    fn test_extension_ranges() {
        assert_eq!(ExtensionRange::for_request(499), None);
        assert_eq!(ExtensionRange::for_request(500), Some(ExtensionRange::Port));
        assert_eq!(ExtensionRange::for_request(1999), Some(ExtensionRange::FileSystem));
        assert_eq!(ExtensionRange::for_request(2000), Some(ExtensionRange::Network));
        assert_eq!(ExtensionRange::for_request(5999), Some(ExtensionRange::Graphics));
        assert_eq!(ExtensionRange::for_request(6000), None);
    }

    struct Recorder(Rc<RefCell<alloc::vec::Vec<(u32, u32)>>>);

    impl ExternalDispatch for Recorder {
        fn dispatch(&mut self, module: ModuleId, request: u32, _params: [u32; 3]) -> u32 {
            self.0.borrow_mut().push((module.0, request));
            0x55
        }

        fn stop(&mut self, module: ModuleId) {
            self.0.borrow_mut().push((module.0, 0));
        }
    }

    struct Echo;

    impl ApplicationDispatch for Echo {
        fn dispatch(&mut self, request: u32, params: [u32; 3]) -> u32 {
            request + params[0]
        }
    }

    #[test]
    fn test_extension_routing() {
        let log = Rc::new(RefCell::new(alloc::vec::Vec::new()));
        let mut ext = Extensions::default();
        assert_eq!(ext.route(ModuleId(3), 2001, [0; 3]), Completion::from(Status::NotAvailable));
        assert_eq!(ext.route(ModuleId(3), APPLICATION_REQUEST_BASE + 4, [1, 0, 0]), Completion::from(Status::NotAvailable));

        ext.install(ExtensionRange::Network, alloc::boxed::Box::new(Recorder(log.clone())));
        ext.install_application(alloc::boxed::Box::new(Echo));
        assert!(ext.is_installed(ExtensionRange::Network));
        assert_eq!(ext.route(ModuleId(3), 2001, [0; 3]), Completion::Return(0x55));
        assert_eq!(ext.route(ModuleId(3), 1001, [0; 3]), Completion::from(Status::NotAvailable));
        assert_eq!(ext.route(ModuleId(3), APPLICATION_REQUEST_BASE + 4, [1, 0, 0]), Completion::Return(5));
        assert_eq!(ext.route(ModuleId(3), 97, [0; 3]), Completion::from(Status::NotAvailable));

        ext.stop_all(ModuleId(3));
        assert_eq!(*log.borrow(), alloc::vec![(3, 2001), (3, 0)]);
    }
}
