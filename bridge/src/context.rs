//! Per-invocation guest context.
//!
//! A `GuestContext` is built once per guest invocation and passed to every
//! call site. It owns the host runtime, the release ledger, the cached host
//! function table and the clock; there is no process-wide state.

use chrono::{DateTime, Utc};

use tether_hostapi::{HostFunctionDescriptor, HostRuntime};

use crate::clock::{self, Clock, SystemClock};
use crate::error::BridgeResult;
use crate::handle::HandleLedger;
use crate::host::Host;
use crate::memory::Memory;

/// Explicit context for one guest invocation.
pub struct GuestContext<H: HostRuntime> {
    runtime: H,
    ledger: HandleLedger,
    functions: Option<Vec<HostFunctionDescriptor>>,
    clock: Box<dyn Clock>,
}

impl<H: HostRuntime> GuestContext<H> {
    /// Context over `runtime` using the system clock.
    pub fn new(runtime: H) -> Self {
        Self::with_clock(runtime, SystemClock)
    }

    pub fn with_clock(runtime: H, clock: impl Clock + 'static) -> Self {
        Self {
            runtime,
            ledger: HandleLedger::new(),
            functions: None,
            clock: Box::new(clock),
        }
    }

    /// Memory Bridge view.
    pub fn memory(&mut self) -> Memory<'_, H> {
        Memory::new(&mut self.runtime, &mut self.ledger)
    }

    /// Host Call Bridge view.
    pub fn host(&mut self) -> Host<'_, H> {
        Host::new(&mut self.runtime, &self.ledger, &mut self.functions)
    }

    /// Current time from the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// `millis` since the epoch when given, otherwise the clock's `now`.
    pub fn date(&self, millis: Option<i64>) -> BridgeResult<DateTime<Utc>> {
        match millis {
            Some(ms) => clock::from_millis(ms),
            None => Ok(self.now()),
        }
    }

    pub fn ledger(&self) -> &HandleLedger {
        &self.ledger
    }

    pub fn host_runtime(&self) -> &H {
        &self.runtime
    }

    pub fn host_runtime_mut(&mut self) -> &mut H {
        &mut self.runtime
    }

    /// End the invocation and hand the runtime back.
    pub fn into_host(self) -> H {
        self.runtime
    }
}
