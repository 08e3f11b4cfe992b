//! The caller's cooperative context.
//!
//! A [`Runtime`] lives on the caller's thread. It exposes the four entry points
//! and drives delivery of asynchronous results. Argument and validation errors
//! are returned from the entry point itself, before any task exists; failures of
//! the transform reach the caller through the same channel as its result, the
//! return value for sync calls and the continuation for async ones.

use std::cell::Cell;
use std::sync::Arc;

use anyhow::Result;
use flume::unbounded;
use tracing::debug;

use crate::config::BridgeConfig;
use crate::engine::{Engine, Transform};
use crate::error::BridgeError;
use crate::options::CompressionOptions;
use crate::types::{Operation, Task, Value};
use crate::worker::{CompletionBridge, Dispatcher};

/// The caller-side half of the bridge.
///
/// Owns the transform, the worker pool and the completion channel. It is not
/// `Sync`; continuations of async calls run on whichever thread drives it.
/// Dropping a runtime blocks until every in-flight call has been delivered.
pub struct Runtime {
    transform: Arc<dyn Transform>,
    dispatcher: Dispatcher,
    bridge: CompletionBridge,
    next_id: Cell<u64>,
}

impl Runtime {
    /// Creates a runtime backed by the built-in [`Engine`].
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be built.
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        Self::with_transform(config, Arc::new(Engine::new(config.memory_limit)))
    }

    /// Creates a runtime backed by a custom transform.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be built.
    pub fn with_transform(config: &BridgeConfig, transform: Arc<dyn Transform>) -> Result<Self> {
        let (sender, receiver) = unbounded();
        let dispatcher = Dispatcher::new(config, Arc::clone(&transform), sender)?;
        debug!(workers = dispatcher.worker_threads(), memory_limit = config.memory_limit, "runtime started");

        Ok(Self { transform, dispatcher, bridge: CompletionBridge::new(receiver), next_id: Cell::new(0) })
    }

    /// `compressSync(buffer, method?, fileName?, comment?, sha1?)`
    ///
    /// Compresses on the calling thread and returns the compressed bytes.
    pub fn compress_sync(&self, args: Vec<Value<'_>>) -> Result<Value<'static>, BridgeError> {
        let input = args.first().and_then(Value::as_buffer).ok_or_else(|| BridgeError::argument("compressSync: need a buffer as first argument"))?;
        let options = CompressionOptions::resolve(&args, 0)?;

        Operation::Compress(options).apply(self.transform.as_ref(), input).map(Value::from)
    }

    /// `decompressSync(buffer)`
    ///
    /// Decompresses on the calling thread and returns the original bytes.
    pub fn decompress_sync(&self, args: Vec<Value<'_>>) -> Result<Value<'static>, BridgeError> {
        let input = match args.as_slice() {
            [value] => value.as_buffer(),
            _ => None,
        }
        .ok_or_else(|| BridgeError::argument("decompressSync: need a buffer as the only argument"))?;

        Operation::Decompress.apply(self.transform.as_ref(), input).map(Value::from)
    }

    /// `compressAsync(buffer, callback, method?, fileName?, comment?, sha1?)`
    ///
    /// Queues the compression and returns `undefined`. The callback fires on
    /// this runtime's thread once the result is delivered.
    pub fn compress_async(&self, args: Vec<Value<'_>>) -> Result<Value<'static>, BridgeError> {
        check_async_shape(&args, "compressAsync")?;
        let options = CompressionOptions::resolve(&args, 1)?;

        self.submit(args, Operation::Compress(options), "compressAsync")
    }

    /// `decompressAsync(buffer, callback)`
    ///
    /// Queues the decompression and returns `undefined`.
    pub fn decompress_async(&self, args: Vec<Value<'_>>) -> Result<Value<'static>, BridgeError> {
        check_async_shape(&args, "decompressAsync")?;

        self.submit(args, Operation::Decompress, "decompressAsync")
    }

    fn submit(&self, args: Vec<Value<'_>>, operation: Operation, name: &str) -> Result<Value<'static>, BridgeError> {
        let mut args = args.into_iter();
        let (Some(Value::Buffer(input)), Some(Value::Function(continuation))) = (args.next(), args.next()) else {
            return Err(async_shape_error(name));
        };

        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let task = Task::new(id, operation, &input, continuation);
        // The caller's buffer is released here; the task holds its own copy.
        drop(input);

        self.bridge.track();
        self.dispatcher.submit(task);

        Ok(Value::Undefined)
    }

    /// Delivers every completion already available, without blocking.
    pub fn poll(&self) -> usize {
        self.bridge.poll()
    }

    /// Blocks until every in-flight call has been delivered.
    pub fn run(&self) {
        self.bridge.run();
    }

    /// Awaits until every in-flight call has been delivered.
    pub async fn run_async(&self) {
        self.bridge.run_async().await;
    }

    /// Awaits and delivers a single completion; `false` when nothing is in flight.
    pub async fn turn(&self) -> bool {
        self.bridge.turn().await
    }

    /// Number of async calls submitted and not yet delivered.
    #[inline]
    pub fn pending(&self) -> usize {
        self.bridge.pending()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        let pending = self.bridge.pending();
        if pending > 0 {
            debug!(pending, "runtime dropped, delivering in-flight calls");
            self.bridge.run();
        }
    }
}

fn check_async_shape(args: &[Value<'_>], name: &str) -> Result<(), BridgeError> {
    match args {
        [Value::Buffer(_), Value::Function(_), ..] => Ok(()),
        _ => Err(async_shape_error(name)),
    }
}

fn async_shape_error(name: &str) -> BridgeError {
    BridgeError::argument(format!("{name}: need both a buffer and a callback"))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::thread;

    use super::*;
    use crate::error::ErrorKind;

    type Calls = Arc<Mutex<Vec<(Option<BridgeError>, Option<Vec<u8>>)>>>;

    fn runtime() -> Runtime {
        Runtime::new(&BridgeConfig::default().with_worker_threads(4)).unwrap()
    }

    fn recorder() -> (Calls, Value<'static>) {
        let calls: Calls = Arc::default();
        let sink = Arc::clone(&calls);
        (calls, Value::function(move |err, bytes| sink.lock().unwrap().push((err, bytes))))
    }

    fn bytes(value: Value<'_>) -> Vec<u8> {
        value.into_bytes().expect("buffer result")
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 253) as u8).collect()
    }

    #[test]
    fn test_roundtrip_sync() {
        let rt = runtime();
        for data in [Vec::new(), b"Hello World!".to_vec(), sample(200 * 1024)] {
            let compressed = bytes(rt.compress_sync(vec![Value::from(data.as_slice())]).unwrap());
            let restored = bytes(rt.decompress_sync(vec![Value::from(compressed)]).unwrap());
            assert_eq!(restored, data);
        }
    }

    #[test]
    fn test_default_equivalence() {
        let rt = runtime();
        let data = sample(4096);

        let implicit = bytes(rt.compress_sync(vec![Value::from(data.as_slice())]).unwrap());
        let explicit = bytes(rt.compress_sync(vec![Value::from(data.as_slice()), Value::from("14,128,0"), Value::from(""), Value::from(""), Value::from(true)]).unwrap());
        assert_eq!(implicit, explicit);
    }

    #[test]
    fn test_sync_async_equivalence() {
        let rt = runtime();
        let data = sample(70 * 1024);
        let options = CompressionOptions::default().with_file_name("data.bin").with_comment("equivalence");

        let mut args = vec![Value::from(data.as_slice())];
        args.extend(options.to_args());
        let sync_bytes = bytes(rt.compress_sync(args).unwrap());

        let (calls, callback) = recorder();
        let mut args = vec![Value::from(data.as_slice()), callback];
        args.extend(options.to_args());
        assert!(matches!(rt.compress_async(args).unwrap(), Value::Undefined));
        rt.run();

        let mut calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (err, async_bytes) = calls.pop().unwrap();
        assert!(err.is_none());
        assert_eq!(async_bytes.as_deref(), Some(sync_bytes.as_slice()));

        let (calls, callback) = recorder();
        rt.decompress_async(vec![Value::from(sync_bytes.clone()), callback]).unwrap();
        rt.run();
        let decompressed_sync = bytes(rt.decompress_sync(vec![Value::from(sync_bytes)]).unwrap());
        assert_eq!(calls.lock().unwrap()[0].1.as_deref(), Some(decompressed_sync.as_slice()));
        assert_eq!(decompressed_sync, data);
    }

    #[test]
    fn test_single_delivery_on_failure() {
        let rt = runtime();
        let (calls, callback) = recorder();

        rt.decompress_async(vec![Value::from(&b"bytes not produced by compress"[..]), callback]).unwrap();
        assert_eq!(rt.pending(), 1);
        rt.run();
        assert_eq!(rt.pending(), 0);
        // Nothing left to deliver.
        assert_eq!(rt.poll(), 0);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let (err, bytes) = &calls[0];
        assert_eq!(err.as_ref().map(BridgeError::kind), Some(ErrorKind::Transform));
        assert!(bytes.is_none());
    }

    #[test]
    fn test_continuation_runs_on_caller_thread() {
        let rt = runtime();
        let caller = thread::current().id();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);

        rt.compress_async(vec![Value::from(&b"where am i"[..]), Value::function(move |_, _| *sink.lock().unwrap() = Some(thread::current().id()))]).unwrap();
        rt.run();

        assert_eq!(*seen.lock().unwrap(), Some(caller));
    }

    #[test]
    fn test_argument_errors() {
        let rt = runtime();

        let err = rt.compress_sync(Vec::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);

        let err = rt.compress_sync(vec![Value::from("not a buffer")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);

        let err = rt.decompress_sync(vec![Value::Null]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);

        let err = rt.decompress_sync(vec![Value::from(&b"x"[..]), Value::Null]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);

        let err = rt.compress_async(vec![Value::from(&b"x"[..])]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        assert_eq!(err.message(), "compressAsync: need both a buffer and a callback");

        let err = rt.decompress_async(vec![Value::from(&b"x"[..]), Value::from("not callable")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);

        assert_eq!(rt.pending(), 0);
    }

    #[test]
    fn test_validation_error_raised_before_scheduling() {
        let rt = runtime();

        let err = rt.compress_sync(vec![Value::from(&b"Hello World!"[..]), Value::from(42.0)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.message().contains("string"));

        let (calls, callback) = recorder();
        let err = rt.compress_async(vec![Value::from(&b"Hello World!"[..]), callback, Value::Null, Value::Null, Value::Null, Value::from("yes")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.message().contains("boolean"));
        assert_eq!(rt.pending(), 0);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_out_of_memory_on_both_paths() {
        let rt = Runtime::new(&BridgeConfig::default().with_worker_threads(1).with_memory_limit(1024)).unwrap();
        let data = sample(8192);

        let err = rt.compress_sync(vec![Value::from(data.as_slice())]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfMemory);

        let (calls, callback) = recorder();
        rt.compress_async(vec![Value::from(data.as_slice()), callback]).unwrap();
        rt.run();
        let calls = calls.lock().unwrap();
        assert_eq!(calls[0].0.as_ref().map(BridgeError::kind), Some(ErrorKind::OutOfMemory));
        assert!(calls[0].1.is_none());
    }

    #[test]
    fn test_long_metadata_roundtrip() {
        let rt = runtime();
        let comment = "c".repeat(100 * 1024);

        let compressed = bytes(rt.compress_sync(vec![Value::from(&b"Hello World!"[..]), Value::Null, Value::Null, Value::from(comment.as_str())]).unwrap());
        assert_eq!(Engine::inspect(&compressed).unwrap().comment(), comment);

        let restored = bytes(rt.decompress_sync(vec![Value::from(compressed)]).unwrap());
        assert_eq!(restored, b"Hello World!");
    }

    #[test]
    fn test_invalid_method_is_transform_error() {
        let rt = runtime();
        let err = rt.compress_sync(vec![Value::from(&b"abc"[..]), Value::from("zz")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transform);
    }

    #[test]
    fn test_concurrent_independence() {
        let rt = runtime();
        let results: Arc<Mutex<Vec<(usize, Vec<u8>)>>> = Arc::default();
        let inputs: Vec<Vec<u8>> = (0..16).map(|i| sample(1000 + i * 777)).collect();

        for (index, input) in inputs.iter().enumerate() {
            let sink = Arc::clone(&results);
            let callback = Value::function(move |err, bytes| {
                assert!(err.is_none());
                sink.lock().unwrap().push((index, bytes.unwrap_or_default()));
            });
            rt.compress_async(vec![Value::from(input.as_slice()), callback]).unwrap();
        }
        assert_eq!(rt.pending(), inputs.len());
        rt.run();

        let results = results.lock().unwrap();
        assert_eq!(results.len(), inputs.len());
        for (index, compressed) in results.iter() {
            let restored = bytes(rt.decompress_sync(vec![Value::from(compressed.as_slice())]).unwrap());
            assert_eq!(&restored, &inputs[*index]);
        }
    }

    #[test]
    fn test_caller_buffer_may_change_after_submit() {
        let rt = runtime();
        let mut data = b"original contents".to_vec();
        let (calls, callback) = recorder();

        rt.compress_async(vec![Value::from(data.as_slice()), callback]).unwrap();
        data.fill(b'#');
        rt.run();

        let compressed = calls.lock().unwrap()[0].1.clone().unwrap();
        let restored = bytes(rt.decompress_sync(vec![Value::from(compressed)]).unwrap());
        assert_eq!(restored, b"original contents");
    }

    #[test]
    fn test_drop_delivers_in_flight_calls() {
        let rt = runtime();
        let (calls, callback) = recorder();

        rt.compress_async(vec![Value::from(sample(4 * 1024 * 1024).as_slice()), callback]).unwrap();
        assert_eq!(rt.pending(), 1);
        drop(rt);

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.is_none());
        assert!(calls[0].1.is_some());
    }

    #[tokio::test]
    async fn test_run_async_delivers() {
        let rt = runtime();
        let (calls, callback) = recorder();

        rt.compress_async(vec![Value::from(&b"async"[..]), callback]).unwrap();
        rt.run_async().await;

        assert_eq!(calls.lock().unwrap().len(), 1);
    }
}
