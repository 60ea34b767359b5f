use std::{
    process::{Child, Command},
    time::{Duration, Instant},
};

pub fn bin_path() -> &'static str {
    env!("CARGO_BIN_EXE_csp-report-collector")
}

pub fn ctl_path() -> &'static str {
    env!("CARGO_BIN_EXE_cspctl")
}

/// A small helper to spawn the binary in tests and ensure we never hang.
pub struct ManagedChild {
    child: Child,
}

impl ManagedChild {
    pub fn spawn(mut cmd: Command) -> std::io::Result<Self> {
        let child = cmd.spawn()?;
        Ok(Self { child })
    }

    /// True if the process is still running after `max`.
    pub fn still_running_after(&mut self, max: Duration) -> bool {
        let deadline = Instant::now() + max;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => return false,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return true;
                    }
                    std::thread::sleep(Duration::from_millis(25));
                }
                Err(_) => return false,
            }
        }
    }
}

impl Drop for ManagedChild {
    fn drop(&mut self) {
        // Best-effort cleanup to prevent runaway servers in test runs.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
