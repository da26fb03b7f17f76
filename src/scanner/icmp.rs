//! Reachability sweeper. Probes every host address in the anchor's /24
//! with a single one-byte ICMP echo and a bounded timeout, giving up early
//! once a run of consecutive addresses goes unanswered.

use std::mem::MaybeUninit;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ipnetwork::Ipv4Network;
use log::debug;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::sync::Semaphore;

use super::{ProbeOutcome, SweepReport};
use crate::error::{LanError, Result};

/// Consecutive misses tolerated before the rest of the range is skipped.
/// DHCP pools cluster leases at the low end, so a long unanswered run
/// usually means the tail is empty. This trades completeness for latency;
/// callers must never assume a full sweep.
pub const MISS_THRESHOLD: usize = 3;

/// ICMP echo sweeper for one /24 range.
pub struct IcmpSweeper {
    timeout_ms: u64,
    max_concurrent: usize,
}

impl IcmpSweeper {
    pub fn new() -> Self {
        Self {
            timeout_ms: 1000,
            max_concurrent: 32,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    #[allow(dead_code)]
    pub fn with_concurrency(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Build an ICMP echo request with a one-byte payload
    fn build_echo_request(identifier: u16, sequence: u16) -> Vec<u8> {
        let mut packet = vec![0u8; 9];

        // Type: Echo Request (8)
        packet[0] = 8;
        // Code: 0
        packet[1] = 0;
        // Checksum: calculated below
        packet[2] = 0;
        packet[3] = 0;
        // Identifier
        packet[4] = (identifier >> 8) as u8;
        packet[5] = (identifier & 0xff) as u8;
        // Sequence
        packet[6] = (sequence >> 8) as u8;
        packet[7] = (sequence & 0xff) as u8;
        // One payload byte, zero

        let checksum = Self::calculate_checksum(&packet);
        packet[2] = (checksum >> 8) as u8;
        packet[3] = (checksum & 0xff) as u8;

        packet
    }

    /// Internet checksum over the ICMP message
    fn calculate_checksum(data: &[u8]) -> u16 {
        let mut sum: u32 = 0;
        let mut i = 0;

        while i < data.len() {
            let word = if i + 1 < data.len() {
                ((data[i] as u32) << 8) | (data[i + 1] as u32)
            } else {
                (data[i] as u32) << 8
            };
            sum = sum.wrapping_add(word);
            i += 2;
        }

        while (sum >> 16) != 0 {
            sum = (sum & 0xffff) + (sum >> 16);
        }

        !sum as u16
    }

    /// Probe a single address. Any failure along the way is an ordinary
    /// miss; it feeds the early-exit counter rather than an error path.
    fn probe(&self, ip: Ipv4Addr, sequence: u16) -> ProbeOutcome {
        let Ok(socket) = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4)) else {
            return ProbeOutcome::Unreachable;
        };

        let timeout = Duration::from_millis(self.timeout_ms);
        let _ = socket.set_write_timeout(Some(timeout));

        let identifier = std::process::id() as u16;
        let packet = Self::build_echo_request(identifier, sequence);
        let addr = SocketAddr::new(IpAddr::V4(ip), 0);

        if socket.send_to(&packet, &addr.into()).is_err() {
            return ProbeOutcome::Unreachable;
        }

        // A raw ICMP socket is handed a copy of every inbound ICMP packet,
        // including replies meant for concurrently running probes. Drain
        // the socket until the deadline and accept only the reply this
        // probe asked for.
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || socket.set_read_timeout(Some(remaining)).is_err() {
                return ProbeOutcome::Unreachable;
            }

            // MaybeUninit buffer as required by socket2
            let mut buffer: [MaybeUninit<u8>; 1024] =
                unsafe { MaybeUninit::uninit().assume_init() };
            let Ok((len, from)) = socket.recv_from(&mut buffer) else {
                return ProbeOutcome::Unreachable;
            };
            // Safety: `len` bytes are initialized by recv_from
            let datagram: &[u8] =
                unsafe { std::slice::from_raw_parts(buffer.as_ptr() as *const u8, len) };
            let source = from.as_socket_ipv4().map(|s| *s.ip());
            if is_matching_reply(datagram, source, ip, identifier, sequence) {
                return ProbeOutcome::Reachable;
            }
        }
    }

    /// Candidate host addresses for the anchor's /24: the full range minus
    /// the network and broadcast addresses and the anchor itself.
    fn candidates(anchor: Ipv4Addr) -> Result<Vec<Ipv4Addr>> {
        let network =
            Ipv4Network::new(anchor, 24).map_err(|_| LanError::InvalidAnchor(anchor))?;
        Ok(network
            .iter()
            .filter(|&ip| ip != network.network() && ip != network.broadcast() && ip != anchor)
            .collect())
    }

    /// Sweep the anchor's /24. Probes run concurrently in address-ordered
    /// batches; between batches the consecutive-miss counter decides
    /// whether the remainder of the range is still worth probing.
    pub async fn sweep(&self, anchor: Ipv4Addr) -> Result<SweepReport> {
        let started = Instant::now();
        let candidates = Self::candidates(anchor)?;
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));

        let mut reachable = Vec::new();
        let mut probes_sent = 0usize;
        let mut misses = 0usize;

        for batch in candidates.chunks(self.max_concurrent) {
            let mut handles = Vec::with_capacity(batch.len());
            for (offset, &ip) in batch.iter().enumerate() {
                let sem = semaphore.clone();
                let timeout_ms = self.timeout_ms;
                let seq = sequence_for(probes_sent + offset);

                handles.push(tokio::task::spawn_blocking(move || {
                    let rt = tokio::runtime::Handle::current();
                    let _permit = rt.block_on(sem.acquire());
                    let prober = IcmpSweeper::new().with_timeout(timeout_ms);
                    (ip, prober.probe(ip, seq))
                }));
            }

            let mut outcomes = Vec::with_capacity(handles.len());
            for handle in handles {
                if let Ok(result) = handle.await {
                    outcomes.push(result);
                }
            }
            probes_sent += outcomes.len();

            for (ip, outcome) in &outcomes {
                if *outcome == ProbeOutcome::Reachable {
                    reachable.push(*ip);
                }
            }

            let batch_outcomes: Vec<ProbeOutcome> =
                outcomes.iter().map(|(_, outcome)| *outcome).collect();
            if register_outcomes(&mut misses, &batch_outcomes) {
                debug!(
                    "sweep anchored at {} stopped after {} probes ({} consecutive misses)",
                    anchor, probes_sent, misses
                );
                break;
            }
        }

        Ok(SweepReport {
            reachable,
            probes_sent,
            elapsed: started.elapsed(),
        })
    }
}

impl Default for IcmpSweeper {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether an inbound datagram is the echo reply a probe asked for: sent
/// by the probed address, ICMP type 0 code 0, echoing the request's
/// identifier and sequence. Anything else on the socket is crosstalk from
/// concurrent probes or unrelated ICMP traffic.
fn is_matching_reply(
    datagram: &[u8],
    source: Option<Ipv4Addr>,
    probed: Ipv4Addr,
    identifier: u16,
    sequence: u16,
) -> bool {
    if source != Some(probed) {
        return false;
    }
    // The IP header length field covers options
    let Some(&first) = datagram.first() else {
        return false;
    };
    let header_len = usize::from(first & 0x0f) * 4;
    let Some(icmp) = datagram.get(header_len..) else {
        return false;
    };
    if icmp.len() < 8 || icmp[0] != 0 || icmp[1] != 0 {
        return false;
    }
    u16::from_be_bytes([icmp[4], icmp[5]]) == identifier
        && u16::from_be_bytes([icmp[6], icmp[7]]) == sequence
}

/// Wrapping sequence number for the nth probe of a sweep.
fn sequence_for(index: usize) -> u16 {
    (index % (usize::from(u16::MAX) + 1)) as u16
}

/// Fold a batch of address-ordered outcomes into the running miss counter.
/// Returns true once the counter has exceeded [`MISS_THRESHOLD`], meaning
/// no further addresses should be dispatched in this sweep.
fn register_outcomes(misses: &mut usize, outcomes: &[ProbeOutcome]) -> bool {
    let mut stop = false;
    for outcome in outcomes {
        match outcome {
            ProbeOutcome::Reachable => *misses = 0,
            ProbeOutcome::Unreachable => {
                *misses += 1;
                if *misses > MISS_THRESHOLD {
                    stop = true;
                }
            }
        }
    }
    stop
}
