/*******************************************************************************
 * Copyright (c) 2024 Cénotélie Opérations SAS (cenotelie.fr)
 ******************************************************************************/

//! Wait strategies for contended reservations and slot handshakes

use crossbeam_utils::Backoff;

/// A wait strategy
pub trait WaitStrategy: Default {
    /// Wait a little bit
    fn wait(&self);
}

/// Delegates to crossbeam `Backoff` to busy-spin
#[derive(Debug, Default)]
pub struct SpinWaitStrategy {
    inner: Backoff,
}

impl WaitStrategy for SpinWaitStrategy {
    fn wait(&self) {
        self.inner.spin();
    }
}

/// Delegates to crossbeam `Backoff` to snooze, escalating from spins to yields
#[derive(Debug, Default)]
pub struct SnoozeWaitStrategy {
    inner: Backoff,
}

impl WaitStrategy for SnoozeWaitStrategy {
    fn wait(&self) {
        self.inner.snooze();
    }
}

/// Yield the thread to the OS on every wait
#[derive(Debug, Default)]
pub struct YieldWaitStrategy;

impl WaitStrategy for YieldWaitStrategy {
    fn wait(&self) {
        std::thread::yield_now();
    }
}
