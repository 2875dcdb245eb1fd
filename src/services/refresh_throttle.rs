use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Resultado de un pedido de refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Lista recargada con N entradas
    Refreshed(usize),
    /// Dentro de la ventana: se reejecuta al cerrarse
    Deferred,
}

/// Ventana compartida entre refresh de la lista completa
pub struct RefreshThrottle {
    window: Duration,
    last: Mutex<Option<Instant>>,
    deferred: AtomicBool,
}

impl RefreshThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last: Mutex::new(None),
            deferred: AtomicBool::new(false),
        }
    }

    /// Tiempo que falta para cerrar la ventana, si sigue abierta
    pub fn remaining(&self) -> Option<Duration> {
        let last = (*self.last.lock())?;
        let deadline = last + self.window;
        let now = Instant::now();
        (deadline > now).then(|| deadline - now)
    }

    pub fn mark(&self) {
        *self.last.lock() = Some(Instant::now());
    }

    /// Marca un refresh diferido; `false` si ya había uno programado
    pub fn defer(&self) -> bool {
        !self.deferred.swap(true, Ordering::SeqCst)
    }

    pub fn clear_deferred(&self) {
        self.deferred.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_window() {
        let throttle = RefreshThrottle::new(Duration::from_secs(2));
        assert!(throttle.remaining().is_none());

        throttle.mark();
        assert_eq!(throttle.remaining(), Some(Duration::from_secs(2)));
        assert!(throttle.defer());
        assert!(!throttle.defer());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(throttle.remaining().is_none());
        throttle.clear_deferred();
        assert!(throttle.defer());
    }
}
