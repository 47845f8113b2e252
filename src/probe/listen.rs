// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Inbound listen probe: bind a TCP listener on a wildcard address.
//!
//! A sandbox that lets the workload bind publicly can expose a service to
//! anything that reaches the host. The listener is held until cleanup.

use std::io;
use std::net::TcpListener;

use super::egress::network_attempt;
use super::{Category, Held, Probe, ProbeContext, ProbeDescriptor};
use crate::outcome::{Attempt, AttemptStatus, ProbeFault, ProbeValue, RawResult};

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

pub struct ListenProbe {
    name: String,
    bind: String,
    listeners: Held<TcpListener>,
}

impl ListenProbe {
    pub fn new(bind: impl Into<String>) -> Self {
        Self {
            name: "listen".to_string(),
            bind: bind.into(),
            listeners: Held::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn bind_address(&self) -> &str {
        &self.bind
    }

    pub fn open_listeners(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for ListenProbe {
    fn default() -> Self {
        Self::new(DEFAULT_BIND)
    }
}

impl Probe for ListenProbe {
    fn describe(&self) -> ProbeDescriptor {
        ProbeDescriptor::new(&self.name, Category::Network).side_effect_free()
    }

    fn run(&self, ctx: &ProbeContext) -> RawResult {
        self.listeners.open();
        if ctx.is_cancelled() {
            return ctx.timed_out();
        }
        let target = format!("listen {}", self.bind);

        let attempt = match TcpListener::bind(self.bind.as_str()) {
            Ok(listener) => {
                let local = listener
                    .local_addr()
                    .map_or_else(|_| self.bind.clone(), |a| a.to_string());
                if self.listeners.hold(listener).is_err() {
                    return ctx.timed_out();
                }
                tracing::debug!(probe = %self.name, address = %local, "listener bound");
                Attempt::succeeded(target, format!("listening on {local}"))
            }
            // Someone else owns the port: says nothing about the sandbox.
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                let mut attempt = Attempt::from_fault(target, &ProbeFault::from_io("bind", &e));
                attempt.status = AttemptStatus::Inconclusive;
                attempt
            }
            Err(e) => {
                tracing::debug!(probe = %self.name, bind = %self.bind, error = %e, "bind refused");
                network_attempt(target, &ProbeFault::from_io(&format!("bind {}", self.bind), &e))
            }
        };
        RawResult::Value(ProbeValue::Attempts {
            attempts: vec![attempt],
        })
    }

    fn cleanup(&self) {
        let closed = self.listeners.release().len();
        tracing::debug!(probe = %self.name, closed, "listeners closed");
    }
}
