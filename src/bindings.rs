//! Registration of the four entry points with a host.
//!
//! A host calls [`init`] once at startup with whatever surface it uses to look
//! up operations by name. [`Module`] is a ready-made surface backed by a hash
//! map, for hosts that dispatch calls themselves.

use hashbrown::HashMap;
use tracing::debug;

use crate::error::BridgeError;
use crate::runtime::Runtime;
use crate::types::Value;

pub const COMPRESS_SYNC: &str = "compressSync";
pub const COMPRESS_ASYNC: &str = "compressAsync";
pub const DECOMPRESS_SYNC: &str = "decompressSync";
pub const DECOMPRESS_ASYNC: &str = "decompressAsync";

/// Signature shared by every entry point.
pub type Handler = fn(&Runtime, Vec<Value<'_>>) -> Result<Value<'static>, BridgeError>;

/// Surface the host exposes operations through.
pub trait Exports {
    fn export(&mut self, name: &'static str, handler: Handler);
}

/// Registers the four entry points.
pub fn init<E: Exports + ?Sized>(exports: &mut E) {
    exports.export(DECOMPRESS_SYNC, Runtime::decompress_sync);
    exports.export(DECOMPRESS_ASYNC, Runtime::decompress_async);
    exports.export(COMPRESS_SYNC, Runtime::compress_sync);
    exports.export(COMPRESS_ASYNC, Runtime::compress_async);
}

/// Name-indexed handler table.
#[derive(Default)]
pub struct Module {
    handlers: HashMap<&'static str, Handler>,
}

impl Module {
    /// Creates a module with the four entry points registered.
    pub fn new() -> Self {
        let mut module = Self::default();
        init(&mut module);
        module
    }

    /// Calls the operation registered under `name`.
    pub fn invoke(&self, runtime: &Runtime, name: &str, args: Vec<Value<'_>>) -> Result<Value<'static>, BridgeError> {
        let handler = self.handlers.get(name).ok_or_else(|| BridgeError::argument(format!("unknown operation: {name}")))?;
        handler(runtime, args)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.keys().copied()
    }
}

impl Exports for Module {
    fn export(&mut self, name: &'static str, handler: Handler) {
        debug!(name, "exported");
        self.handlers.insert(name, handler);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::BridgeConfig;
    use crate::error::ErrorKind;

    struct Recording(Vec<&'static str>);

    impl Exports for Recording {
        fn export(&mut self, name: &'static str, _handler: Handler) {
            self.0.push(name);
        }
    }

    #[test]
    fn test_init_registers_four_operations() {
        let mut recording = Recording(Vec::new());
        init(&mut recording);

        let mut names = recording.0;
        names.sort_unstable();
        assert_eq!(names, [COMPRESS_ASYNC, COMPRESS_SYNC, DECOMPRESS_ASYNC, DECOMPRESS_SYNC]);
    }

    #[test]
    fn test_module_dispatch() {
        let module = Module::new();
        assert_eq!(module.names().count(), 4);

        let runtime = Runtime::new(&BridgeConfig::default().with_worker_threads(1)).unwrap();
        let compressed = module.invoke(&runtime, COMPRESS_SYNC, vec![Value::from(&b"Hello World!"[..])]).unwrap().into_bytes().unwrap();

        let delivered = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&delivered);
        let callback = Value::function(move |err, bytes| {
            assert!(err.is_none());
            *sink.lock().unwrap() = bytes;
        });

        let returned = module.invoke(&runtime, DECOMPRESS_ASYNC, vec![Value::from(compressed), callback]).unwrap();
        assert!(matches!(returned, Value::Undefined));
        runtime.run();

        assert_eq!(delivered.lock().unwrap().as_deref(), Some(&b"Hello World!"[..]));
    }

    #[test]
    fn test_module_unknown_operation() {
        let module = Module::new();
        let runtime = Runtime::new(&BridgeConfig::default().with_worker_threads(1)).unwrap();

        let err = module.invoke(&runtime, "compressStream", Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
    }
}
