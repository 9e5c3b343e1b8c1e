// CorePlug - CPU Core Integration Layer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{IntegrationError, IntegrationResult, WidthKind};
use coreplug_config::{FabricBusConfig, HandshakeGeometry, PortKind};
use std::collections::VecDeque;

/// Descriptor of one CPU memory port: the native handshake geometry bound to
/// a port kind. One instance per instruction/data/unified port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusPort {
    kind: PortKind,
    address_width: u8,
    data_width: u8,
    granularity: u8,
}

impl BusPort {
    pub fn new(kind: PortKind, geometry: HandshakeGeometry) -> Self {
        Self {
            kind,
            address_width: geometry.address_width,
            data_width: geometry.data_width,
            granularity: geometry.granularity,
        }
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn address_width(&self) -> u8 {
        self.address_width
    }

    pub fn data_width(&self) -> u8 {
        self.data_width
    }

    pub fn granularity(&self) -> u8 {
        self.granularity
    }
}

/// Policy for a native/fabric data-width difference, fixed at build time.
///
/// `Reject` fails adaptation outright. `Narrow` adapts a narrower core onto
/// a wider fabric by placing data and byte-enables in the addressed lane;
/// a fabric narrower than the core is always rejected, so data is never
/// silently truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WidthPolicy {
    #[default]
    Reject,
    Narrow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeAccess {
    Read,
    Write(u64),
}

/// A transaction as the CPU core issues it on its native handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeRequest {
    pub addr: u64,
    pub access: NativeAccess,
    /// Byte-enable mask, `granularity` bits wide.
    pub byte_enable: u8,
}

/// Completion returned to the core. `seq` is the per-port issue number of
/// the request this response pairs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeResponse {
    pub seq: u64,
    pub data: u64,
}

/// A transaction in the fabric's canonical protocol: request asserted with
/// address, write data and byte strobes driven, then wait-for-acknowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FabricRequest {
    pub seq: u64,
    pub addr: u64,
    pub data: u64,
    /// Byte strobes at fabric granularity.
    pub sel: u8,
    pub we: bool,
}

/// The fabric's acknowledge, carrying read data when the paired request was
/// a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FabricResponse {
    pub data: u64,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    seq: u64,
    write: bool,
    /// Bit offset of the native word inside the fabric word (0 when widths
    /// match).
    lane_shift: u8,
}

/// Translates one CPU port's native transactions into fabric transactions
/// and pairs fabric acknowledges back to the issuing requests.
///
/// The adapter holds no state beyond the in-flight bookkeeping. Within one
/// port, completion is strictly in order: responses always pair the oldest
/// outstanding request. Backpressure is the fabric's concern and passes
/// through unchanged.
#[derive(Debug)]
pub struct BusAdapter {
    port: BusPort,
    fabric: FabricBusConfig,
    policy: WidthPolicy,
    in_flight: VecDeque<InFlight>,
    next_seq: u64,
}

impl BusAdapter {
    /// Validates the port against the fabric's declared widths.
    ///
    /// Address widths must match exactly. Data widths must match exactly
    /// under `Reject`; under `Narrow`, the fabric must be an integer
    /// multiple wider than the core.
    pub fn new(
        port: BusPort,
        fabric: FabricBusConfig,
        policy: WidthPolicy,
    ) -> IntegrationResult<Self> {
        if port.address_width != fabric.address_width {
            return Err(IntegrationError::WidthMismatch {
                what: WidthKind::Address,
                native: port.address_width,
                fabric: fabric.address_width,
            });
        }

        if port.data_width != fabric.data_width {
            let narrowable = policy == WidthPolicy::Narrow
                && fabric.data_width > port.data_width
                && fabric.data_width % port.data_width == 0;
            if !narrowable {
                return Err(IntegrationError::WidthMismatch {
                    what: WidthKind::Data,
                    native: port.data_width,
                    fabric: fabric.data_width,
                });
            }
        }

        tracing::debug!(
            "{:?} port adapter: native {}-bit on {}-bit fabric, {:?} policy",
            port.kind,
            port.data_width,
            fabric.data_width,
            policy
        );

        Ok(Self {
            port,
            fabric,
            policy,
            in_flight: VecDeque::new(),
            next_seq: 0,
        })
    }

    pub fn port(&self) -> &BusPort {
        &self.port
    }

    pub fn policy(&self) -> WidthPolicy {
        self.policy
    }

    /// Number of requests issued to the fabric and not yet acknowledged.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Translates a native request into exactly one fabric request.
    ///
    /// The address must lie within the port's addressable range and the
    /// byte-enable mask within the port's granularity; the request is
    /// recorded so the eventual acknowledge can be paired in issue order.
    pub fn translate_request(&mut self, req: &NativeRequest) -> IntegrationResult<FabricRequest> {
        let width = self.port.address_width;
        if width < 64 && (req.addr >> width) != 0 {
            return Err(IntegrationError::AddressRange {
                kind: self.port.kind,
                addr: req.addr,
                width,
            });
        }

        let granularity = self.port.granularity;
        if req.byte_enable == 0
            || (granularity < 8 && (req.byte_enable >> granularity) != 0)
        {
            return Err(IntegrationError::ByteEnable {
                kind: self.port.kind,
                mask: req.byte_enable,
                granularity,
            });
        }

        let native_bytes = u64::from(self.port.data_width / 8);
        let fabric_bytes = u64::from(self.fabric.data_width / 8);
        let lane_shift = if fabric_bytes == native_bytes {
            0u8
        } else {
            let lane = (req.addr % fabric_bytes) / native_bytes;
            (lane * native_bytes * 8) as u8
        };

        let native_mask = if self.port.data_width < 64 {
            (1u64 << self.port.data_width) - 1
        } else {
            u64::MAX
        };

        let (we, data) = match req.access {
            NativeAccess::Read => (false, 0),
            NativeAccess::Write(value) => (true, (value & native_mask) << lane_shift),
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.in_flight.push_back(InFlight {
            seq,
            write: we,
            lane_shift,
        });

        let fabric_req = FabricRequest {
            seq,
            addr: req.addr,
            data,
            sel: req.byte_enable << (lane_shift / 8),
            we,
        };
        tracing::trace!(
            "{:?} port: native {:#x} {} -> fabric seq {} sel {:#b}",
            self.port.kind,
            req.addr,
            if we { "write" } else { "read" },
            seq,
            fabric_req.sel
        );
        Ok(fabric_req)
    }

    /// Pairs a fabric acknowledge with the oldest in-flight request and
    /// translates it back to the core.
    ///
    /// An acknowledge with nothing in flight is a protocol-order violation
    /// and fails; it is never dropped.
    pub fn translate_response(&mut self, resp: &FabricResponse) -> IntegrationResult<NativeResponse> {
        let pending = self
            .in_flight
            .pop_front()
            .ok_or(IntegrationError::ResponseWithoutRequest {
                kind: self.port.kind,
            })?;

        let data = if pending.write {
            0
        } else {
            let shifted = resp.data >> pending.lane_shift;
            if self.port.data_width < 64 {
                shifted & ((1u64 << self.port.data_width) - 1)
            } else {
                shifted
            }
        };

        Ok(NativeResponse {
            seq: pending.seq,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry32() -> HandshakeGeometry {
        HandshakeGeometry {
            address_width: 32,
            data_width: 32,
            granularity: 4,
        }
    }

    fn fabric(address_width: u8, data_width: u8) -> FabricBusConfig {
        FabricBusConfig {
            address_width,
            data_width,
        }
    }

    fn adapter32() -> BusAdapter {
        let port = BusPort::new(PortKind::Data, geometry32());
        BusAdapter::new(port, fabric(32, 32), WidthPolicy::Reject).unwrap()
    }

    #[test]
    fn read_round_trip_preserves_address_and_data() {
        let mut adapter = adapter32();
        let req = NativeRequest {
            addr: 0x8000_0040,
            access: NativeAccess::Read,
            byte_enable: 0b1111,
        };
        let fabric_req = adapter.translate_request(&req).unwrap();
        assert_eq!(fabric_req.addr, 0x8000_0040);
        assert!(!fabric_req.we);
        assert_eq!(fabric_req.sel, 0b1111);

        let resp = adapter
            .translate_response(&FabricResponse { data: 0xDEAD_BEEF })
            .unwrap();
        assert_eq!(resp.data, 0xDEAD_BEEF);
        assert_eq!(resp.seq, fabric_req.seq);
        assert_eq!(adapter.in_flight(), 0);
    }

    #[test]
    fn write_carries_data_and_strobes() {
        let mut adapter = adapter32();
        let req = NativeRequest {
            addr: 0x100,
            access: NativeAccess::Write(0xCAFE),
            byte_enable: 0b0011,
        };
        let fabric_req = adapter.translate_request(&req).unwrap();
        assert!(fabric_req.we);
        assert_eq!(fabric_req.data, 0xCAFE);
        assert_eq!(fabric_req.sel, 0b0011);
    }

    #[test]
    fn completion_stays_in_issue_order() {
        let mut adapter = adapter32();
        let mut seqs = Vec::new();
        for i in 0..3u64 {
            let req = NativeRequest {
                addr: i * 4,
                access: NativeAccess::Read,
                byte_enable: 0b1111,
            };
            seqs.push(adapter.translate_request(&req).unwrap().seq);
        }
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(adapter.in_flight(), 3);

        for expected in seqs {
            let resp = adapter
                .translate_response(&FabricResponse { data: 0 })
                .unwrap();
            assert_eq!(resp.seq, expected);
        }
    }

    #[test]
    fn out_of_range_address_fails() {
        let geometry = HandshakeGeometry {
            address_width: 16,
            data_width: 32,
            granularity: 4,
        };
        let port = BusPort::new(PortKind::Instruction, geometry);
        let mut adapter = BusAdapter::new(port, fabric(16, 32), WidthPolicy::Reject).unwrap();
        let err = adapter
            .translate_request(&NativeRequest {
                addr: 0x1_0000,
                access: NativeAccess::Read,
                byte_enable: 0b1111,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            IntegrationError::AddressRange { addr: 0x1_0000, width: 16, .. }
        ));
        assert_eq!(adapter.in_flight(), 0);
    }

    #[test]
    fn invalid_byte_enable_fails() {
        let mut adapter = adapter32();
        let err = adapter
            .translate_request(&NativeRequest {
                addr: 0,
                access: NativeAccess::Read,
                byte_enable: 0b1_0000,
            })
            .unwrap_err();
        assert!(matches!(err, IntegrationError::ByteEnable { mask: 0b1_0000, .. }));

        let err = adapter
            .translate_request(&NativeRequest {
                addr: 0,
                access: NativeAccess::Read,
                byte_enable: 0,
            })
            .unwrap_err();
        assert!(matches!(err, IntegrationError::ByteEnable { mask: 0, .. }));
    }

    #[test]
    fn reject_policy_fails_width_difference() {
        let port = BusPort::new(PortKind::Data, geometry32());
        let err = BusAdapter::new(port, fabric(32, 64), WidthPolicy::Reject).unwrap_err();
        assert!(matches!(
            err,
            IntegrationError::WidthMismatch {
                what: WidthKind::Data,
                native: 32,
                fabric: 64,
            }
        ));
    }

    #[test]
    fn address_width_must_match_exactly() {
        let port = BusPort::new(PortKind::Data, geometry32());
        let err = BusAdapter::new(port, fabric(24, 32), WidthPolicy::Narrow).unwrap_err();
        assert!(matches!(
            err,
            IntegrationError::WidthMismatch {
                what: WidthKind::Address,
                ..
            }
        ));
    }

    #[test]
    fn narrow_policy_places_data_in_addressed_lane() {
        let port = BusPort::new(PortKind::Data, geometry32());
        let mut adapter = BusAdapter::new(port, fabric(32, 64), WidthPolicy::Narrow).unwrap();

        // Upper 32-bit lane of the 64-bit fabric word.
        let req = NativeRequest {
            addr: 0x14,
            access: NativeAccess::Write(0xAABB_CCDD),
            byte_enable: 0b1111,
        };
        let fabric_req = adapter.translate_request(&req).unwrap();
        assert_eq!(fabric_req.data, 0xAABB_CCDD_0000_0000);
        assert_eq!(fabric_req.sel, 0b1111_0000);

        // Lower lane is untouched.
        let req = NativeRequest {
            addr: 0x10,
            access: NativeAccess::Write(0x1122_3344),
            byte_enable: 0b0001,
        };
        let fabric_req = adapter.translate_request(&req).unwrap();
        assert_eq!(fabric_req.data, 0x1122_3344);
        assert_eq!(fabric_req.sel, 0b0000_0001);
    }

    #[test]
    fn narrow_policy_extracts_read_lane() {
        let port = BusPort::new(PortKind::Data, geometry32());
        let mut adapter = BusAdapter::new(port, fabric(32, 64), WidthPolicy::Narrow).unwrap();

        let _ = adapter
            .translate_request(&NativeRequest {
                addr: 0x14,
                access: NativeAccess::Read,
                byte_enable: 0b1111,
            })
            .unwrap();
        let resp = adapter
            .translate_response(&FabricResponse {
                data: 0xAABB_CCDD_1122_3344,
            })
            .unwrap();
        assert_eq!(resp.data, 0xAABB_CCDD);
    }

    #[test]
    fn narrow_policy_never_widens() {
        let geometry = HandshakeGeometry {
            address_width: 32,
            data_width: 64,
            granularity: 8,
        };
        let port = BusPort::new(PortKind::Data, geometry);
        let err = BusAdapter::new(port, fabric(32, 32), WidthPolicy::Narrow).unwrap_err();
        assert!(matches!(
            err,
            IntegrationError::WidthMismatch {
                what: WidthKind::Data,
                native: 64,
                fabric: 32,
            }
        ));
    }

    #[test]
    fn response_without_request_fails() {
        let mut adapter = adapter32();
        let err = adapter
            .translate_response(&FabricResponse { data: 0 })
            .unwrap_err();
        assert!(matches!(
            err,
            IntegrationError::ResponseWithoutRequest {
                kind: PortKind::Data
            }
        ));
    }
}
