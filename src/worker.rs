//! Background request/response worker.
//!
//! One thread per worker; requests are handled in submission order and
//! responses are polled without blocking.
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct Worker<Q, R> {
    tx: Option<Sender<Q>>,
    rx: Receiver<R>,
    handle: Option<JoinHandle<()>>,
    name: String,
}

impl<Q, R> Worker<Q, R>
where
    Q: Send + 'static,
    R: Send + 'static,
{
    /// Spawn a thread that maps each request through `handler`.
    ///
    /// # Errors
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn<F>(name: &str, mut handler: F) -> std::io::Result<Self>
    where
        F: FnMut(Q) -> R + Send + 'static,
    {
        let (req_tx, req_rx) = mpsc::channel::<Q>();
        let (resp_tx, resp_rx) = mpsc::channel::<R>();
        let thread_name = format!("codepane-{name}");
        let handle = thread::Builder::new().name(thread_name).spawn(move || {
            while let Ok(request) = req_rx.recv() {
                if resp_tx.send(handler(request)).is_err() {
                    break;
                }
            }
        })?;
        Ok(Self {
            tx: Some(req_tx),
            rx: resp_rx,
            handle: Some(handle),
            name: name.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a request. Returns `false` if the worker thread has exited.
    pub fn submit(&self, request: Q) -> bool {
        let sent = self.tx.as_ref().is_some_and(|tx| tx.send(request).is_ok());
        if !sent {
            tracing::warn!(worker = %self.name, "worker thread is gone, request dropped");
        }
        sent
    }

    pub fn try_recv(&self) -> Option<R> {
        self.rx.try_recv().ok()
    }

    /// Every response that is ready now.
    pub fn drain(&self) -> Vec<R> {
        self.rx.try_iter().collect()
    }

    /// Block for the next response, up to `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<R> {
        match self.rx.recv_timeout(timeout) {
            Ok(response) => Some(response),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl<Q, R> Drop for Worker<Q, R> {
    fn drop(&mut self) {
        // Closing the request channel ends the thread's loop.
        self.tx.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!(worker = %self.name, "worker thread panicked");
        }
    }
}
