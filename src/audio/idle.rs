use std::{future::Future, time::Duration};
use tokio::task::JoinHandle;
use tracing::debug;

/// Acción diferida cancelable de un solo hueco.
///
/// Cada `arm` recibe un token nuevo que se pasa a la acción al dispararse.
/// El dueño lo compara con [`IdleTimer::is_current`] en ese momento, así un
/// timer que perdió la carrera con [`IdleTimer::disarm`] no hace nada.
#[derive(Debug, Default)]
pub struct IdleTimer {
    armed: Option<ArmedTimer>,
    next_token: u64,
}

#[derive(Debug)]
struct ArmedTimer {
    token: u64,
    handle: JoinHandle<()>,
}

impl IdleTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Programa `action(token)` tras `after`; cancela cualquier timer previo
    pub fn arm<F, Fut>(&mut self, after: Duration, action: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.disarm();

        self.next_token += 1;
        let token = self.next_token;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            action(token).await;
        });

        debug!("⏲️ Timer de inactividad #{} armado ({:?})", token, after);
        self.armed = Some(ArmedTimer { token, handle });
        token
    }

    /// Cancela el timer pendiente, si existe
    pub fn disarm(&mut self) -> bool {
        match self.armed.take() {
            Some(timer) => {
                timer.handle.abort();
                debug!("⏲️ Timer de inactividad #{} cancelado", timer.token);
                true
            }
            None => false,
        }
    }

    /// Marca como disparado el timer de `token`, sin abortarlo.
    ///
    /// Devuelve `false` si ese timer ya fue reemplazado o cancelado.
    pub fn consume(&mut self, token: u64) -> bool {
        if self.is_current(token) {
            self.armed = None;
            true
        } else {
            false
        }
    }

    pub fn is_current(&self, token: u64) -> bool {
        self.armed.as_ref().is_some_and(|t| t.token == token)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
