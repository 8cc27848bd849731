//! Blocking adapters over suspending effects
//!
//! The blocking entry points drive suspending work on a private
//! current-thread scheduler. Building a runtime inside an existing tokio
//! context panics, so these adapters must only be reached from synchronous
//! callers; the public API documents this.

use std::future::Future;

use futures::stream::BoxStream;
use futures::StreamExt;

use crate::error::{Error, Result};

/// Run a suspending computation to completion on a private scheduler,
/// blocking the calling thread.
pub(crate) fn block_on<T>(future: impl Future<Output = Result<T>>) -> Result<T> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| Error::Scheduler {
            message: err.to_string(),
        })?;
    runtime.block_on(future)
}

/// Blocking iterator over a suspension-driven stream.
///
/// Owns one private scheduler and drives the stream one element per `next`.
/// The iterator fuses after the first error.
pub(crate) struct BlockingStreamIter<T> {
    runtime: tokio::runtime::Runtime,
    stream: BoxStream<'static, Result<T>>,
    done: bool,
}

impl<T> BlockingStreamIter<T> {
    pub(crate) fn new(stream: BoxStream<'static, Result<T>>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| Error::Scheduler {
                message: err.to_string(),
            })?;
        Ok(Self {
            runtime,
            stream,
            done: false,
        })
    }
}

impl<T> Iterator for BlockingStreamIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.runtime.block_on(self.stream.next()) {
            Some(Ok(value)) => Some(Ok(value)),
            Some(Err(err)) => {
                self.done = true;
                Some(Err(err))
            }
            None => {
                self.done = true;
                None
            }
        }
    }
}
