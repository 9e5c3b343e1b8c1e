// CorePlug - CPU Core Integration Layer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

pub mod bus;
pub mod integration;
pub mod irq;
pub mod reset;
pub mod signals;
pub mod variant;

pub use bus::{BusAdapter, BusPort, FabricRequest, FabricResponse, NativeAccess, NativeRequest,
    NativeResponse, WidthPolicy};
pub use coreplug_config::PortKind;
pub use integration::{BuildStep, IntegrationHandle, Integrator, ParamValue};
pub use irq::{InterruptBridge, IrqLine};
pub use reset::{ResetAction, ResetPlan, ResetSequencer};
pub use variant::{CpuVariant, FeatureSet, VariantResolver};

/// Which declared width a mismatch was detected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthKind {
    Address,
    Data,
    Granularity,
}

impl std::fmt::Display for WidthKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WidthKind::Address => write!(f, "address"),
            WidthKind::Data => write!(f, "data"),
            WidthKind::Granularity => write!(f, "byte-enable"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IntegrationError {
    #[error("address {addr:#x} outside the {width}-bit range of the {kind:?} port")]
    AddressRange { kind: PortKind, addr: u64, width: u8 },

    #[error("{what} width mismatch: core declares {native} bits, fabric provides {fabric} bits")]
    WidthMismatch {
        what: WidthKind,
        native: u8,
        fabric: u8,
    },

    #[error("byte-enable mask {mask:#b} invalid for {granularity}-bit granularity on the {kind:?} port")]
    ByteEnable {
        kind: PortKind,
        mask: u8,
        granularity: u8,
    },

    #[error("fabric response on the {kind:?} port with no request in flight")]
    ResponseWithoutRequest { kind: PortKind },

    #[error("IRQ source index {index} declared twice (second declaration: '{name}')")]
    DuplicateIrq { index: u32, name: String },

    #[error("IRQ source {index} ('{name}') has no fabric input; fabric exposes {inputs}")]
    UnresolvedIrq {
        index: u32,
        name: String,
        inputs: u32,
    },

    #[error("unknown variant '{name}'; known variants: {known}")]
    UnknownVariant { name: String, known: String },

    #[error("unknown feature '{name}'")]
    UnknownFeature { name: String },

    #[error("reset dependency cycle through '{via}'")]
    DependencyCycle { via: String },

    #[error("reset plan references unknown component '{id}' (required by '{wanted_by}')")]
    UnresolvedDependency { id: String, wanted_by: String },

    #[error("reset actuation failed at '{action}': {reason}")]
    Actuator { action: String, reason: String },

    #[error("{step} failed")]
    Build {
        step: BuildStep,
        #[source]
        source: Box<IntegrationError>,
    },
}

pub type IntegrationResult<T> = Result<T, IntegrationError>;

impl IntegrationError {
    /// The failing build step, when the facade tagged this error.
    pub fn step(&self) -> Option<BuildStep> {
        match self {
            IntegrationError::Build { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Innermost error, unwrapping any facade step tagging.
    pub fn root(&self) -> &IntegrationError {
        match self {
            IntegrationError::Build { source, .. } => source.root(),
            other => other,
        }
    }
}

/// An address range assigned by the SoC generator's memory map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct AssignedRange {
    pub base: u64,
    pub size: u64,
}

impl AssignedRange {
    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }
}

/// Memory-map allocation callback consumed from the SoC generator: returns
/// the address range assigned to one CPU port.
pub trait MemoryMapAllocator {
    fn allocate(&mut self, kind: PortKind, size: u64) -> IntegrationResult<AssignedRange>;
}

/// Build-time view of the fabric's interrupt controller.
///
/// Generalizes over concrete controllers (PLIC, event manager, ...) the same
/// way runtime controllers are swapped behind a trait: the bridge only needs
/// the input count and a registration hook, plus a pending-level hook for
/// the post-build path.
pub trait FabricIrqController {
    /// Number of external interrupt inputs the fabric exposes.
    fn input_count(&self) -> u32;

    /// Register one static binding. Called only with inputs `< input_count()`,
    /// after the whole set has been validated.
    fn register(&mut self, input: u32, line: &irq::IrqLine);

    /// Propagate the level of a bound line.
    fn set_pending(&mut self, input: u32, pending: bool);
}

/// Clock/reset-domain actuation consumed from the SoC generator; the
/// sequencer drives this strictly in plan order.
pub trait ResetActuator {
    fn assert_reset(&mut self, id: &str) -> IntegrationResult<()>;
    fn release_reset(&mut self, id: &str) -> IntegrationResult<()>;
    fn wait_cycles(&mut self, cycles: u32) -> IntegrationResult<()>;
}
