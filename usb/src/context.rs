// The transport doesn't own an event loop, it attaches to one. libusb's event handling and
// every blocking transfer are run on whatever runtime the EventContext hands back, so the
// caller decides where completions land. If they don't care, the DefaultContext lazily spins
// up a small process-wide runtime which lives for the remainder of the process.
use crate::error::{Result, SensorError};
use lazy_static::lazy_static;
use log::debug;
use tokio::runtime::{Builder, Handle, Runtime};

pub trait EventContext: Send + Sync {
    fn name(&self) -> &str;
    fn runtime(&self) -> Result<Handle>;
}

lazy_static! {
    static ref DEFAULT_RUNTIME: std::io::Result<Runtime> = {
        debug!("Building default event runtime");
        Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("colorsense-events")
            .enable_all()
            .build()
    };
}

/// The process-wide default event loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultContext;

impl EventContext for DefaultContext {
    fn name(&self) -> &str {
        "default"
    }

    fn runtime(&self) -> Result<Handle> {
        match &*DEFAULT_RUNTIME {
            Ok(runtime) => Ok(runtime.handle().clone()),
            Err(error) => Err(SensorError::Context(format!(
                "Unable to build the default runtime: {}",
                error
            ))),
        }
    }
}

/// A caller supplied Tokio runtime.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    name: String,
    handle: Handle,
}

impl RuntimeContext {
    pub fn new(name: impl Into<String>, handle: Handle) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }

    /// Wraps the runtime the caller is currently executing on.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| SensorError::Context(format!("Not inside a Tokio runtime: {}", e)))?;
        Ok(Self::new("current", handle))
    }
}

impl EventContext for RuntimeContext {
    fn name(&self) -> &str {
        &self.name
    }

    fn runtime(&self) -> Result<Handle> {
        Ok(self.handle.clone())
    }
}
