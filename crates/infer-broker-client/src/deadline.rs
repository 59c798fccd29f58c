use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Wall-clock budget for one HTTP call.
///
/// Arming spawns a timer task that cancels [`Deadline::token`] when the
/// budget runs out. The timer is aborted when the deadline is dropped, so it
/// can never fire after the guarded call has finished, whichever way it
/// finished.
pub struct Deadline {
    token: CancellationToken,
    timer: JoinHandle<()>,
    budget: Duration,
}

/// The guarded future did not finish within its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elapsed(pub Duration);

impl Deadline {
    pub fn arm(budget: Duration) -> Self {
        let token = CancellationToken::new();
        let timer = tokio::spawn({
            let token = token.clone();
            async move {
                tokio::time::sleep(budget).await;
                token.cancel();
            }
        });
        Self {
            token,
            timer,
            budget,
        }
    }

    /// Cancellation signal shared with the in-flight request.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Drive `fut` until it completes or the deadline cancels it. A cancelled
    /// future is dropped, which aborts the underlying request.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, Elapsed>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Elapsed(self.budget)),
            out = fut => Ok(out),
        }
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
