use std::process::{Child, ExitStatus};

/// Handle to a started debug client.
///
/// Local clients are killed when the handle is dropped. Clients started by
/// an execution server are owned by that server and have no local process.
#[derive(Debug)]
pub struct ClientProcess {
    child: Option<Child>,
    description: String,
}

impl ClientProcess {
    pub(crate) fn local(child: Child, description: String) -> Self {
        Self {
            child: Some(child),
            description,
        }
    }

    pub(crate) fn remote(description: String) -> Self {
        Self {
            child: None,
            description,
        }
    }

    /// Operating system id of the local process.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn is_local(&self) -> bool {
        self.child.is_some()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Exit status if the local process has finished.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => child.try_wait(),
            None => Ok(None),
        }
    }

    /// Block until the local process exits.
    pub fn wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => child.wait().map(Some),
            None => Ok(None),
        }
    }

    /// Ask the local process to stop.
    ///
    /// On unix this sends `SIGTERM` so the client can exit cleanly; elsewhere
    /// the process is killed.
    pub fn terminate(&mut self) -> std::io::Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        if child.try_wait()?.is_some() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{Signal, kill};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(child.id() as i32);
            kill(pid, Signal::SIGTERM).map_err(std::io::Error::from)
        }

        #[cfg(not(unix))]
        {
            child.kill()
        }
    }
}

impl Drop for ClientProcess {
    fn drop(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        tracing::debug!(pid = child.id(), client = %self.description, "terminating debug client");
        match child.kill() {
            Ok(_) => {
                let _ = child.wait();
            }
            Err(e) => tracing::warn!(error = %e, "could not terminate debug client"),
        }
    }
}
