//! Protocol timeouts and retry budgets.
//!
//! Every suspension point in DRTP is a bounded wait.  [`TimerConfig`] collects
//! them in one place so the client, server and tests agree on the values:
//!
//! | phase                  | wait          | attempts |
//! |------------------------|---------------|----------|
//! | client SYN             | 2 s each      | 5        |
//! | server SYN             | 30 s in total | -        |
//! | server final ACK       | 3 s           | 1        |
//! | data retransmission    | 400 ms (RTO)  | no limit |
//! | teardown FIN           | 3 s each      | 5        |
//!
//! The RTO is fixed; there is no RTT estimation or back-off.

use std::time::Duration;

/// Adjustable timeout parameters.  `Default` gives the protocol constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// How long the client waits for a SYN-ACK after each SYN.
    pub syn_timeout: Duration,
    /// Total SYN transmissions before the client gives up.
    pub syn_attempts: u32,
    /// Total time the server waits for an initial SYN.
    pub accept_timeout: Duration,
    /// How long the server waits for the final ACK after its SYN-ACK.
    pub final_ack_timeout: Duration,
    /// Retransmission timeout during data transfer.
    pub rto: Duration,
    /// How long the closer waits for a FIN-ACK after each FIN.
    pub fin_timeout: Duration,
    /// Total FIN transmissions before closing anyway.
    pub fin_attempts: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            syn_timeout: Duration::from_secs(2),
            syn_attempts: 5,
            accept_timeout: Duration::from_secs(30),
            final_ack_timeout: Duration::from_secs(3),
            rto: Duration::from_millis(400),
            fin_timeout: Duration::from_secs(3),
            fin_attempts: 5,
        }
    }
}

impl TimerConfig {
    /// Short waits for loopback tests that exercise the failure paths.
    pub fn fast() -> Self {
        Self {
            syn_timeout: Duration::from_millis(100),
            accept_timeout: Duration::from_millis(500),
            final_ack_timeout: Duration::from_millis(150),
            rto: Duration::from_millis(50),
            fin_timeout: Duration::from_millis(100),
            ..Self::default()
        }
    }
}
