// Copyright 2021 - 2025 Martin Pool

//! Shared helpers for tests.

#![cfg(test)]

use std::sync::Mutex;

/// Serializes access to process environment variables across tests that
/// need to set or remove them, since they're global, process-wide state.
/// Pair with `rusty_fork_test!` for tests that also need their own
/// process (e.g. because they fork, or because ordering with other
/// env-var tests can't otherwise be guaranteed).
static ENV_MUTEX: Mutex<()> = Mutex::new(());

pub fn single_threaded_set_env_var(key: &str, value: &str) {
    let _guard = ENV_MUTEX.lock().unwrap();
    std::env::set_var(key, value);
}

pub fn single_threaded_remove_env_var(key: &str) {
    let _guard = ENV_MUTEX.lock().unwrap();
    std::env::remove_var(key);
}
