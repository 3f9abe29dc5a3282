use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::*;

/// Action requested on the server process, either by an operator through
/// the admin API or by a process signal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ServiceSignal {
    Restart,
    Stop,
}

impl FromSignal for ServiceSignal {
    fn from(sig: Signal) -> Self {
        match sig {
            Signal::Hup => ServiceSignal::Restart,
            Signal::Int | Signal::Term | Signal::Quit => ServiceSignal::Stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_service_signal() {
        assert_eq!(
            ServiceSignal::from_str("restart").unwrap(),
            ServiceSignal::Restart
        );
        assert_eq!(ServiceSignal::from_str("stop").unwrap(), ServiceSignal::Stop);
        assert!(ServiceSignal::from_str("reload").is_err());
        assert_eq!(ServiceSignal::Stop.to_string(), "stop");
        assert_eq!(
            <ServiceSignal as FromSignal>::from(Signal::Hup),
            ServiceSignal::Restart
        );
    }

    #[tokio::test]
    async fn test_signaller_channel() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ServiceSignal>();
        tx.signal(Signal::Term);
        assert_eq!(rx.recv().await, Some(ServiceSignal::Stop));
    }
}
