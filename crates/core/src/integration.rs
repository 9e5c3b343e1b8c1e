// CorePlug - CPU Core Integration Layer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::bus::{BusAdapter, BusPort, WidthPolicy};
use crate::irq::{InterruptBridge, IrqLine};
use crate::reset::{ResetDomain, ResetPlan, ResetSequencer};
use crate::variant::{CpuVariant, FeatureSet, VariantResolver};
use crate::{
    AssignedRange, FabricIrqController, IntegrationError, IntegrationResult, MemoryMapAllocator,
    ResetActuator,
};
use coreplug_config::{parse_size, CoreDescriptor, FabricDescriptor, PortKind};
use std::collections::BTreeMap;
use tracing::info;

/// The facade step a build failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    VariantResolution,
    PortAdaptation,
    MemoryMap,
    IrqBinding,
    ResetPlanning,
    ResetExecution,
}

impl std::fmt::Display for BuildStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BuildStep::VariantResolution => "variant resolution",
            BuildStep::PortAdaptation => "bus port adaptation",
            BuildStep::MemoryMap => "memory-map allocation",
            BuildStep::IrqBinding => "interrupt binding",
            BuildStep::ResetPlanning => "reset plan construction",
            BuildStep::ResetExecution => "reset plan execution",
        };
        write!(f, "{name}")
    }
}

/// A value in the instantiation parameter map handed to the SoC generator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    U64(u64),
    Str(String),
}

/// One instantiated CPU unit, as the SoC generator sees it.
///
/// Owns the resolved variant, the port adapters, the IRQ bridge, and the
/// reset plan; lives until the surrounding build session releases it.
#[derive(Debug)]
pub struct IntegrationHandle {
    core_name: String,
    variant: CpuVariant,
    adapters: Vec<BusAdapter>,
    irq_bridge: InterruptBridge,
    sequencer: ResetSequencer,
    reset_plan: ResetPlan,
    windows: Vec<(PortKind, AssignedRange)>,
    io_region: Option<AssignedRange>,
    reset_vector: u64,
    parameters: BTreeMap<String, ParamValue>,
    gcc_flags: String,
}

impl IntegrationHandle {
    pub fn core_name(&self) -> &str {
        &self.core_name
    }

    pub fn variant(&self) -> &CpuVariant {
        &self.variant
    }

    pub fn ports(&self) -> impl Iterator<Item = &BusPort> {
        self.adapters.iter().map(BusAdapter::port)
    }

    /// Runtime translation engine for one port.
    pub fn adapter_mut(&mut self, kind: PortKind) -> Option<&mut BusAdapter> {
        self.adapters.iter_mut().find(|a| a.port().kind() == kind)
    }

    pub fn irq_bridge(&self) -> &InterruptBridge {
        &self.irq_bridge
    }

    pub fn irq_bridge_mut(&mut self) -> &mut InterruptBridge {
        &mut self.irq_bridge
    }

    pub fn reset_plan(&self) -> &ResetPlan {
        &self.reset_plan
    }

    /// Address window the generator assigned to a port.
    pub fn window(&self, kind: PortKind) -> Option<AssignedRange> {
        self.windows
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, range)| *range)
    }

    pub fn io_region(&self) -> Option<AssignedRange> {
        self.io_region
    }

    pub fn reset_vector(&self) -> u64 {
        self.reset_vector
    }

    /// Generics handed to the core instance (reset PC, enabled extensions).
    pub fn parameters(&self) -> &BTreeMap<String, ParamValue> {
        &self.parameters
    }

    pub fn gcc_flags(&self) -> &str {
        &self.gcc_flags
    }

    /// Re-runs the power-on reset sequence (warm reset).
    pub fn warm_reset(&self, actuator: &mut dyn ResetActuator) -> IntegrationResult<()> {
        self.sequencer.execute(&self.reset_plan, actuator)
    }
}

fn tag(step: BuildStep, source: IntegrationError) -> IntegrationError {
    IntegrationError::Build {
        step,
        source: Box::new(source),
    }
}

/// Entry point the SoC generator instantiates CPU units through.
///
/// Holds the validated core and fabric descriptors plus the variant preset
/// table; everything else (memory map, interrupt controller, reset
/// actuation) is passed per call so independent builds cannot interfere.
#[derive(Debug)]
pub struct Integrator {
    core: CoreDescriptor,
    fabric: FabricDescriptor,
    resolver: VariantResolver,
    window_sizes: Vec<(PortKind, u64)>,
    io_region: Option<AssignedRange>,
}

impl Integrator {
    pub fn new(core: CoreDescriptor, fabric: FabricDescriptor) -> anyhow::Result<Self> {
        core.validate()?;
        fabric.validate()?;

        let resolver = VariantResolver::with_extra_variants(&core.variants)?;

        let mut window_sizes = Vec::with_capacity(core.ports.len());
        for port in &core.ports {
            window_sizes.push((port.kind, parse_size(&port.window_size)?));
        }

        let io_region = match &core.io_region {
            Some(region) => Some(AssignedRange {
                base: region.base,
                size: parse_size(&region.size)?,
            }),
            None => None,
        };

        info!(
            "Integrator ready: core '{}' on fabric '{}'",
            core.name, fabric.name
        );

        Ok(Self {
            core,
            fabric,
            resolver,
            window_sizes,
            io_region,
        })
    }

    pub fn core(&self) -> &CoreDescriptor {
        &self.core
    }

    pub fn fabric(&self) -> &FabricDescriptor {
        &self.fabric
    }

    /// Builds one CPU unit: resolves the variant, adapts the ports, allocates
    /// memory windows, binds the IRQ set, then constructs and executes the
    /// reset plan.
    ///
    /// Fails atomically with a step-tagged error: no handle is returned on
    /// failure, and a reset sequence that fails mid-plan re-asserts every
    /// domain before surfacing. The CPU unit may not issue bus transactions
    /// until this returns.
    pub fn instantiate(
        &self,
        variant_name: &str,
        overrides: &BTreeMap<String, bool>,
        policy: WidthPolicy,
        allocator: &mut dyn MemoryMapAllocator,
        irq_controller: &mut dyn FabricIrqController,
        actuator: &mut dyn ResetActuator,
    ) -> IntegrationResult<IntegrationHandle> {
        info!(
            "Instantiating CPU '{}', variant '{}'",
            self.core.name, variant_name
        );

        let variant = self
            .resolver
            .resolve(variant_name, overrides)
            .map_err(|e| tag(BuildStep::VariantResolution, e))?;

        let mut adapters = Vec::with_capacity(self.core.ports.len());
        for port_cfg in &self.core.ports {
            let port = BusPort::new(port_cfg.kind, self.core.handshake);
            let adapter = BusAdapter::new(port, self.fabric.bus, policy)
                .map_err(|e| tag(BuildStep::PortAdaptation, e))?;
            adapters.push(adapter);
        }

        let mut windows = Vec::with_capacity(self.window_sizes.len());
        for (kind, size) in &self.window_sizes {
            let range = allocator
                .allocate(*kind, *size)
                .map_err(|e| tag(BuildStep::MemoryMap, e))?;
            let width = self.fabric.bus.address_width;
            if width < 64 && range.end() > (1u64 << width) {
                return Err(tag(
                    BuildStep::MemoryMap,
                    IntegrationError::AddressRange {
                        kind: *kind,
                        addr: range.end() - 1,
                        width,
                    },
                ));
            }
            windows.push((*kind, range));
        }

        let lines: Vec<IrqLine> = self.core.irq_pins.iter().map(IrqLine::from).collect();
        let irq_bridge = InterruptBridge::bind(&lines, irq_controller)
            .map_err(|e| tag(BuildStep::IrqBinding, e))?;

        let mut domains: Vec<ResetDomain> =
            self.fabric.reset_domains.iter().map(ResetDomain::from).collect();
        let cpu_deps = if self.fabric.cpu_dependencies.is_empty() {
            // Nothing declared: conservatively wait for every fabric domain.
            domains.iter().map(|d| d.id.clone()).collect()
        } else {
            self.fabric.cpu_dependencies.clone()
        };
        domains.push(ResetDomain {
            id: self.core.name.clone(),
            depends_on: cpu_deps,
        });

        let sequencer = ResetSequencer::new(self.fabric.settle_cycles);
        let reset_plan = sequencer
            .build_plan(&domains)
            .map_err(|e| tag(BuildStep::ResetPlanning, e))?;
        sequencer
            .execute(&reset_plan, actuator)
            .map_err(|e| tag(BuildStep::ResetExecution, e))?;

        let mut parameters = BTreeMap::new();
        parameters.insert(
            "RESET_PC".to_string(),
            ParamValue::U64(self.core.reset_vector),
        );
        parameters.insert(
            "EXT_M".to_string(),
            ParamValue::Bool(variant.has(FeatureSet::MULTIPLIER)),
        );
        parameters.insert(
            "EXT_C".to_string(),
            ParamValue::Bool(variant.has(FeatureSet::COMPRESSED)),
        );
        parameters.insert(
            "DEBUG_UNIT".to_string(),
            ParamValue::Bool(variant.has(FeatureSet::DEBUG_UNIT)),
        );
        parameters.insert(
            "FAST_IRQ".to_string(),
            ParamValue::Bool(variant.has(FeatureSet::FAST_INTERRUPTS)),
        );
        parameters.insert(
            "VARIANT".to_string(),
            ParamValue::Str(variant.name().to_string()),
        );

        let gcc_flags = variant.gcc_flags(&self.core.toolchain);

        info!(
            "CPU '{}' integrated: {} ports, {} IRQ lines, reset vector {:#x}",
            self.core.name,
            adapters.len(),
            irq_bridge.len(),
            self.core.reset_vector
        );

        Ok(IntegrationHandle {
            core_name: self.core.name.clone(),
            variant,
            adapters,
            irq_bridge,
            sequencer,
            reset_plan,
            windows,
            io_region: self.io_region,
            reset_vector: self.core.reset_vector,
            parameters,
            gcc_flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_step_names() {
        assert_eq!(BuildStep::VariantResolution.to_string(), "variant resolution");
        assert_eq!(BuildStep::ResetExecution.to_string(), "reset plan execution");
    }

    #[test]
    fn step_tagging_keeps_the_root_error() {
        let err = tag(
            BuildStep::IrqBinding,
            IntegrationError::DuplicateIrq {
                index: 2,
                name: "uart".to_string(),
            },
        );
        assert_eq!(err.step(), Some(BuildStep::IrqBinding));
        assert!(matches!(
            err.root(),
            IntegrationError::DuplicateIrq { index: 2, .. }
        ));
    }
}
