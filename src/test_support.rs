//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::error::EcloudError;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportFuture};

/// Scripted transport that answers with pre-seeded results in FIFO order.
///
/// Clones share the same script and request log, so a test can keep one
/// clone for assertions while the client owns another.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<Result<HttpResponse, EcloudError>>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    /// Creates a transport with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an HTTP answer.
    pub fn push_response(&self, status: u16, body: impl Into<String>) {
        self.queue().push_back(Ok(HttpResponse::new(status, body)));
    }

    /// Queues the same HTTP answer `times` times.
    pub fn push_repeated(&self, times: usize, status: u16, body: &str) {
        let mut queue = self.queue();
        for _ in 0..times {
            queue.push_back(Ok(HttpResponse::new(status, body)));
        }
    }

    /// Queues a transport-level failure.
    pub fn push_error(&self, error: EcloudError) {
        self.queue().push_back(Err(error));
    }

    /// Returns a snapshot of every request sent so far.
    #[must_use]
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests sent so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of queued results not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue().len()
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<HttpResponse, EcloudError>>> {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_, HttpResponse> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        let next = self.queue().pop_front().unwrap_or_else(|| {
            Err(EcloudError::Communication {
                message: String::from("no scripted response available"),
                body: None,
            })
        });
        Box::pin(async move { next })
    }
}

/// Produces a minimal task document as returned when polling a task.
#[must_use]
pub fn task_body(status: &str, error_message: Option<&str>) -> String {
    let message = error_message.map_or_else(String::new, |text| {
        format!("<ErrorMessage>{text}</ErrorMessage>")
    });
    format!(
        "<Task href=\"/cloudapi/ecloud/tasks/1\"><Operation>Create Server</Operation><Status>{status}</Status>{message}</Task>"
    )
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
