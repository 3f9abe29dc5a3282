use strum::Display;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

pub trait Signaller: Send + 'static {
    fn signal(&self, sig: Signal);
}

pub trait FromSignal {
    fn from(sig: Signal) -> Self;
}

impl<T: FromSignal + Send + 'static> Signaller for UnboundedSender<T> {
    fn signal(&self, sig: Signal) {
        let _ = self.send(T::from(sig));
    }
}

/// Different types of process signals
#[derive(PartialEq, Eq, Clone, Copy, Debug, Display)]
pub enum Signal {
    /// SIGHUP
    Hup,
    /// SIGINT
    Int,
    /// SIGTERM
    Term,
    /// SIGQUIT
    Quit,
}

impl FromSignal for Signal {
    fn from(sig: Signal) -> Self {
        sig
    }
}

/// Forwards every process signal to `signaller` until the runtime shuts
/// down.
pub fn spawn_signal_listener<S: Signaller>(signaller: S) -> JoinHandle<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let sig_map = [
            (SignalKind::interrupt(), Signal::Int),
            (SignalKind::hangup(), Signal::Hup),
            (SignalKind::terminate(), Signal::Term),
            (SignalKind::quit(), Signal::Quit),
        ];
        let mut signals = sig_map
            .iter()
            .filter_map(|(kind, sig)| {
                signal(*kind)
                    .map(|stream| (*sig, stream))
                    .map_err(|e| {
                        log::error!(
                            "Can not initialize stream handler for {:?} err: {}",
                            sig,
                            e
                        )
                    })
                    .ok()
            })
            .collect::<Vec<_>>();

        tokio::spawn(async move {
            if signals.is_empty() {
                return;
            }
            loop {
                let pending = signals.iter_mut().map(|(sig, stream)| {
                    let sig = *sig;
                    Box::pin(async move { stream.recv().await.map(|_| sig) })
                });
                let (received, _, _) = futures_util::future::select_all(pending).await;
                match received {
                    Some(sig) => signaller.signal(sig),
                    None => break,
                }
            }
        })
    }
    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                signaller.signal(Signal::Int);
            }
        })
    }
}
