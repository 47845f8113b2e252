// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Network egress probe.
//!
//! Name resolution and the outbound TCP connect are reported as separate
//! attempts, so a sandbox that answers DNS but drops connections (or the
//! reverse) shows which channel is open. Literal addresses skip resolution.

use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{Category, Probe, ProbeContext, ProbeDescriptor};
use crate::outcome::{blocking_faults, Attempt, AttemptStatus, FaultKind, ProbeFault, ProbeValue, RawResult};

pub const DEFAULT_ENDPOINT: &str = "api.ipify.org:443";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Attempt for a failed network operation: blocked when the fault is one a
/// network boundary produces, inconclusive otherwise.
pub(crate) fn network_attempt(target: impl Into<String>, fault: &ProbeFault) -> Attempt {
    let mut attempt = Attempt::from_fault(target, fault);
    if blocking_faults(Category::Network).contains(&fault.kind) {
        attempt.status = AttemptStatus::Blocked;
    }
    attempt
}

pub struct EgressProbe {
    name: String,
    endpoint: String,
    connect_timeout: Duration,
    allowed: bool,
}

impl EgressProbe {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            name: "egress".to_string(),
            endpoint: endpoint.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            allowed: false,
        }
    }

    /// The sandbox grants egress: report as a control expected to connect.
    pub fn allowed(mut self, allowed: bool) -> Self {
        self.allowed = allowed;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Host part of `host:port`, or `None` when the endpoint is malformed.
    fn host(&self) -> Option<&str> {
        let (host, port) = self.endpoint.rsplit_once(':')?;
        port.parse::<u16>().ok()?;
        Some(host.trim_start_matches('[').trim_end_matches(']')).filter(|h| !h.is_empty())
    }

    /// Resolve the endpoint, recording the lookup as an attempt.
    fn resolve(&self, host: &str, attempts: &mut Vec<Attempt>) -> Vec<SocketAddr> {
        let target = format!("resolve {host}");
        // Resolution blocks without a timeout; the runner bounds it.
        match self.endpoint.to_socket_addrs() {
            Ok(addrs) => {
                let addrs: Vec<_> = addrs.collect();
                if addrs.is_empty() {
                    attempts.push(Attempt::blocked(target, "no addresses"));
                } else {
                    attempts.push(Attempt::succeeded(
                        target,
                        format!("resolved to {} address(es)", addrs.len()),
                    ));
                }
                addrs
            }
            Err(e) => {
                // getaddrinfo failures carry no errno.
                let fault = ProbeFault::new(FaultKind::NotFound, format!("{target}: {e}"));
                attempts.push(network_attempt(target, &fault));
                Vec::new()
            }
        }
    }
}

impl Default for EgressProbe {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

impl Probe for EgressProbe {
    fn describe(&self) -> ProbeDescriptor {
        let descriptor = ProbeDescriptor::new(&self.name, Category::Network).side_effect_free();
        if self.allowed {
            descriptor.control()
        } else {
            descriptor
        }
    }

    fn run(&self, ctx: &ProbeContext) -> RawResult {
        let Some(host) = self.host() else {
            return ProbeFault::new(
                FaultKind::Other,
                format!("malformed endpoint {:?}, expected host:port", self.endpoint),
            )
            .into();
        };

        let mut attempts = Vec::with_capacity(2);
        let addresses = match self.endpoint.parse::<SocketAddr>() {
            Ok(address) => vec![address],
            Err(_) => self.resolve(host, &mut attempts),
        };

        for address in addresses {
            if ctx.is_cancelled() {
                return ctx.timed_out();
            }
            let timeout = self.connect_timeout.min(ctx.remaining());
            if timeout.is_zero() {
                return ctx.timed_out();
            }
            let target = format!("connect {address}");
            match TcpStream::connect_timeout(&address, timeout) {
                Ok(stream) => {
                    if let Err(e) = stream.shutdown(Shutdown::Both) {
                        tracing::debug!(probe = %self.name, %address, error = %e, "shutdown after connect failed");
                    }
                    tracing::debug!(probe = %self.name, %address, "egress connected");
                    attempts.push(Attempt::succeeded(target, format!("connected to {address}")));
                    break;
                }
                Err(e) => {
                    tracing::debug!(probe = %self.name, %address, error = %e, "connect failed");
                    let fault = ProbeFault::from_io(&target, &e);
                    attempts.push(network_attempt(target, &fault));
                }
            }
        }

        RawResult::Value(ProbeValue::Attempts { attempts })
    }

    // The stream is closed before `run` returns.
    fn cleanup(&self) {}
}
