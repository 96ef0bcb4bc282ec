//! System struct - combines the Axiom audit layer with the kernel state machine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          SYSTEM                             │
//! │                                                             │
//! │   ┌───────────────────────────────────────────────────┐     │
//! │   │                      AXIOM                        │     │
//! │   │   - SysLog (request / response per module call)   │     │
//! │   │   - CommitLog (state mutations)                   │     │
//! │   └───────────────────────────────────────────────────┘     │
//! │                              │                              │
//! │                              ▼                              │
//! │   ┌───────────────────────────────────────────────────┐     │
//! │   │              KernelState (tern-kernel-core)       │     │
//! │   │   - dispatch table and validation                 │     │
//! │   │   - kernel objects, object pool, modules          │     │
//! │   │   - emits CommitTypes for state changes           │     │
//! │   └───────────────────────────────────────────────────┘     │
//! │                                                             │
//! │   HAL: time, interrupt posture, debug output                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All module calls flow: `thread → System::module_call() → Axiom (log) →
//! dispatch (validate, execute) → Axiom (record) → thread`

mod lifecycle;

use alloc::boxed::Box;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use tern_axiom::AxiomGateway;
use tern_hal::HAL;
use tern_kernel_core::dispatch::{self, ApplicationDispatch, ExtensionRange, ExternalDispatch};
use tern_kernel_core::{
    check_all_invariants, time, Addr, Completion, InvariantViolation, KernelConfig, KernelState,
};

use crate::error::KernelError;

/// The kernel runtime: audit gateway, kernel state and platform.
pub struct System<H: HAL> {
    /// Axiom audit layer (SysLog + CommitLog)
    pub axiom: AxiomGateway,
    state: KernelState,
    hal: H,
    boot_time: u64,
    /// HAL time up to which ticks have been processed
    ticked_until: u64,
}

impl<H: HAL> System<H> {
    /// Boot a kernel with the given configuration.
    pub fn new(hal: H, config: KernelConfig) -> Result<Self, KernelError> {
        let boot_time = hal.now_nanos();
        let state = KernelState::new(config)?;
        let kernel = state.kernel_heap.region();
        hal.debug_write(&format!(
            "[kernel] booted: kernel memory {:#010x}..{:#010x}, {} priorities",
            kernel.start, kernel.end, state.config.max_priorities
        ));
        Ok(Self {
            axiom: AxiomGateway::new(boot_time),
            state,
            hal,
            boot_time,
            ticked_until: boot_time,
        })
    }

    /// Boot from a JSON configuration document. Omitted fields take their
    /// defaults.
    pub fn from_config_json(hal: H, json: &str) -> Result<Self, KernelError> {
        let config: KernelConfig = serde_json::from_str(json)?;
        Self::new(hal, config)
    }

    pub fn hal(&self) -> &H {
        &self.hal
    }

    pub fn state(&self) -> &KernelState {
        &self.state
    }

    /// Direct access to kernel state, for hosts that place module images
    /// and run module code.
    pub fn state_mut(&mut self) -> &mut KernelState {
        &mut self.state
    }

    /// Get uptime in nanoseconds.
    pub fn uptime_nanos(&self) -> u64 {
        self.hal.now_nanos().saturating_sub(self.boot_time)
    }

    // ========================================================================
    // Module calls - all go through Axiom
    // ========================================================================

    /// Execute a module call on behalf of `thread`.
    ///
    /// The call is logged to SysLog, validated and executed, and its state
    /// mutations recorded to CommitLog. Returns the result word, or
    /// `Suspended` if the thread must wait.
    pub fn module_call(&mut self, thread: Addr, request: u32, params: [u32; 3]) -> Completion {
        let timestamp = self.uptime_nanos();
        let posture = self.state.interrupt_posture;
        let previous = self.state.current_thread.replace(thread);

        let state = &mut self.state;
        let mut completion = Completion::Suspended;
        self.axiom.syscall(thread, request, params, timestamp, |request, params| {
            completion = dispatch::module_call(state, request, params);
            (completion.word(), state.take_commits())
        });

        self.state.current_thread = previous.filter(|t| self.state.threads.contains(*t));

        if let Some(status) = completion.status().filter(|s| s.is_module_error()) {
            self.hal.debug_write(&format!(
                "[kernel] thread {thread:#010x}: request {request} refused with {status:?}"
            ));
        }
        if self.state.interrupt_posture != posture {
            self.apply_interrupt_posture();
        }
        completion
    }

    fn apply_interrupt_posture(&mut self) {
        let posture = self.state.interrupt_posture;
        if let Err(e) = self.hal.set_interrupt_posture(posture) {
            self.hal
                .debug_write(&format!("[kernel] interrupt posture {posture} not applied: {e}"));
        }
    }

    // ========================================================================
    // Time
    // ========================================================================

    /// Process one kernel tick.
    pub fn tick(&mut self) {
        time::tick(&mut self.state);
        self.flush_commits();
    }

    /// Process every tick that has elapsed in HAL time since the last call.
    ///
    /// Returns the number of ticks processed.
    pub fn poll_ticks(&mut self) -> u64 {
        let period = self.hal.tick_period_nanos().max(1);
        let elapsed = self.hal.now_nanos().saturating_sub(self.ticked_until);
        let ticks = elapsed / period;
        for _ in 0..ticks {
            time::tick(&mut self.state);
        }
        self.ticked_until = self.ticked_until.saturating_add(ticks.saturating_mul(period));
        self.flush_commits();
        ticks
    }

    // ========================================================================
    // Extensions
    // ========================================================================

    /// Install the component serving `range`, returning any it replaces.
    pub fn install_extension(
        &mut self,
        range: ExtensionRange,
        handler: Box<dyn ExternalDispatch>,
    ) -> Option<Box<dyn ExternalDispatch>> {
        let (start, end) = range.bounds();
        self.hal
            .debug_write(&format!("[kernel] extension {range:?} installed for requests {start}..={end}"));
        self.state.extensions.install(range, handler)
    }

    pub fn install_application_handler(&mut self, handler: Box<dyn ApplicationDispatch>) {
        self.hal.debug_write("[kernel] application request handler installed");
        self.state.extensions.install_application(handler);
    }

    // ========================================================================
    // Audit
    // ========================================================================

    /// Serialize SysLog and CommitLog as JSON.
    pub fn audit_json(&self) -> Result<String, KernelError> {
        Ok(self.axiom.export_json()?)
    }

    /// Check kernel invariants, logging each violation.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let violations = check_all_invariants(&self.state);
        for v in &violations {
            self.hal
                .debug_write(&format!("[kernel] invariant {} violated: {}", v.invariant, v.description));
        }
        violations
    }

    /// Move commits recorded by the core into CommitLog.
    fn flush_commits(&mut self) {
        let timestamp = self.uptime_nanos();
        for ct in self.state.take_commits() {
            self.axiom.append_internal_commit(ct, timestamp);
        }
    }
}
