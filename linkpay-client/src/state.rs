//! Observable state of a payment attempt.

/// Where the current payment attempt is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PaymentState {
    /// No attempt in flight.
    #[default]
    Idle,
    /// Waiting for the wallet to sign. May wait on the user indefinitely.
    Signing,
    /// Sending the signed artifact to the chain or the settlement server.
    Submitting,
    /// Waiting for chain confirmation or the settlement response.
    Verifying,
    /// The purchase is recorded.
    Success {
        /// On-chain reference recorded by the ledger.
        reference: String,
        /// The unlocked URL.
        unlocked_content: String,
    },
    /// The attempt failed.
    Error {
        /// What to show the buyer.
        message: String,
    },
}

impl PaymentState {
    /// Whether an attempt is running.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::Signing | Self::Submitting | Self::Verifying)
    }

    /// Whether the attempt has finished, successfully or not.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases() {
        assert!(!PaymentState::Idle.is_in_flight());
        assert!(PaymentState::Signing.is_in_flight());
        assert!(PaymentState::Verifying.is_in_flight());
        let done = PaymentState::Error {
            message: "x".into(),
        };
        assert!(done.is_terminal());
        assert!(!done.is_in_flight());
        assert!(!PaymentState::Idle.is_terminal());
    }
}
