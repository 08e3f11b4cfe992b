//! Typed facade over the entry points.
//!
//! [`Client`] builds the positional arguments itself, so options are checked at
//! compile time, and turns the continuation of an async call into a future.
//! Awaiting that future drives the runtime, delivering other in-flight results
//! along the way, so it must be polled on the runtime's own thread.

use anyhow::Result;
use flume::bounded;

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::options::CompressionOptions;
use crate::runtime::Runtime;
use crate::types::Value;

/// Owns a [`Runtime`] and exposes its entry points with typed arguments.
pub struct Client {
    runtime: Runtime,
}

impl Client {
    /// # Errors
    ///
    /// Returns an error if the worker pool cannot be built.
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        Ok(Self { runtime: Runtime::new(config)? })
    }

    #[inline]
    pub fn from_runtime(runtime: Runtime) -> Self {
        Self { runtime }
    }

    #[inline]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Compresses `input` on the calling thread.
    pub fn compress_sync(&self, input: &[u8], options: &CompressionOptions) -> Result<Vec<u8>, BridgeError> {
        let mut args = vec![Value::from(input)];
        args.extend(options.to_args());
        self.runtime.compress_sync(args).and_then(into_bytes)
    }

    /// Decompresses `input` on the calling thread.
    pub fn decompress_sync(&self, input: &[u8]) -> Result<Vec<u8>, BridgeError> {
        self.runtime.decompress_sync(vec![Value::from(input)]).and_then(into_bytes)
    }

    /// Compresses `input` on the worker pool.
    pub async fn compress(&self, input: &[u8], options: &CompressionOptions) -> Result<Vec<u8>, BridgeError> {
        let (tx, rx) = bounded(1);
        let mut args = vec![Value::from(input), settle_into(tx)];
        args.extend(options.to_args());

        self.runtime.compress_async(args)?;
        self.settle(&rx).await
    }

    /// Decompresses `input` on the worker pool.
    pub async fn decompress(&self, input: &[u8]) -> Result<Vec<u8>, BridgeError> {
        let (tx, rx) = bounded(1);
        self.runtime.decompress_async(vec![Value::from(input), settle_into(tx)])?;
        self.settle(&rx).await
    }

    /// Drives delivery until this call's continuation has fired.
    ///
    /// Another future on the same thread may deliver this call's result, so
    /// the wait races the result channel against the next delivery.
    async fn settle(&self, rx: &flume::Receiver<Result<Vec<u8>, BridgeError>>) -> Result<Vec<u8>, BridgeError> {
        loop {
            tokio::select! {
                biased;

                result = rx.recv_async() => {
                    return result.unwrap_or_else(|_| Err(BridgeError::transform("call dropped without delivering a result")));
                }
                delivered = self.runtime.turn() => {
                    if !delivered && rx.is_empty() {
                        return Err(BridgeError::transform("call finished without delivering a result"));
                    }
                }
            }
        }
    }
}

fn settle_into(tx: flume::Sender<Result<Vec<u8>, BridgeError>>) -> Value<'static> {
    Value::function(move |err, bytes| {
        let result = match (err, bytes) {
            (Some(err), _) => Err(err),
            (None, Some(bytes)) => Ok(bytes),
            (None, None) => Err(BridgeError::transform("continuation fired without a result")),
        };
        let _ = tx.send(result);
    })
}

fn into_bytes(value: Value<'static>) -> Result<Vec<u8>, BridgeError> {
    value.into_bytes().ok_or_else(|| BridgeError::transform("transform returned no buffer"))
}
