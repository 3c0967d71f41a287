//! SIGINT handling: set the process-wide interrupt flag the engine already
//! treats as opaque input, rather than terminating on the spot. The running
//! step (if any) is left to the executor, which checks the flag around each
//! child-process wait.

use swd_core::request_interrupt;

/// Install the SIGINT handler. Must be called once, before `Executor::run`.
pub fn install() -> std::io::Result<()> {
    unsafe {
        signal_hook::low_level::register(signal_hook::consts::SIGINT, || {
            request_interrupt();
        })?;
    }
    Ok(())
}
