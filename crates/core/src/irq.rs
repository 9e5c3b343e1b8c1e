// CorePlug - CPU Core Integration Layer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::signals::InterruptLine;
use crate::{FabricIrqController, IntegrationError, IntegrationResult};
use coreplug_config::IrqPinConfig;
use std::collections::HashSet;

/// One interrupt source exposed by the CPU core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrqLine {
    pub source_index: u32,
    pub name: String,
    pub default_priority: u8,
}

impl From<&IrqPinConfig> for IrqLine {
    fn from(pin: &IrqPinConfig) -> Self {
        Self {
            source_index: pin.index,
            name: pin.name.clone(),
            default_priority: pin.priority,
        }
    }
}

#[derive(Debug)]
struct Binding {
    line: IrqLine,
    input: u32,
    level: InterruptLine,
}

/// Static mapping of the core's IRQ sources onto the fabric's interrupt
/// inputs.
///
/// The mapping is fixed by [`InterruptBridge::bind`] for the lifetime of the
/// integration; there is no runtime remapping. Source index `n` maps to
/// fabric input `n`.
#[derive(Debug)]
pub struct InterruptBridge {
    bindings: Vec<Binding>,
}

impl InterruptBridge {
    /// Validates the whole line set, then registers every binding with the
    /// fabric controller.
    ///
    /// All-or-nothing: a duplicate source index or a source with no fabric
    /// input fails before anything is registered, so a failed bind leaves
    /// the controller untouched.
    pub fn bind(
        lines: &[IrqLine],
        controller: &mut dyn FabricIrqController,
    ) -> IntegrationResult<Self> {
        let inputs = controller.input_count();
        let mut seen = HashSet::new();
        for line in lines {
            if !seen.insert(line.source_index) {
                return Err(IntegrationError::DuplicateIrq {
                    index: line.source_index,
                    name: line.name.clone(),
                });
            }
            if line.source_index >= inputs {
                return Err(IntegrationError::UnresolvedIrq {
                    index: line.source_index,
                    name: line.name.clone(),
                    inputs,
                });
            }
        }

        let mut bindings = Vec::with_capacity(lines.len());
        for line in lines {
            let input = line.source_index;
            controller.register(input, line);
            tracing::debug!(
                "IRQ source {} ('{}') bound to fabric input {}",
                line.source_index,
                line.name,
                input
            );
            bindings.push(Binding {
                line: line.clone(),
                input,
                level: InterruptLine::new(),
            });
        }

        Ok(Self { bindings })
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = &IrqLine> {
        self.bindings.iter().map(|b| &b.line)
    }

    /// Fabric input a source index is bound to, if any.
    pub fn fabric_input(&self, source_index: u32) -> Option<u32> {
        self.bindings
            .iter()
            .find(|b| b.line.source_index == source_index)
            .map(|b| b.input)
    }

    pub fn is_pending(&self, source_index: u32) -> bool {
        self.bindings
            .iter()
            .find(|b| b.line.source_index == source_index)
            .is_some_and(|b| b.level.is_pending())
    }

    /// Latches a source pending and propagates the level to the fabric.
    pub fn raise(
        &mut self,
        source_index: u32,
        controller: &mut dyn FabricIrqController,
    ) -> IntegrationResult<()> {
        let binding = self.binding_mut(source_index, controller.input_count())?;
        binding.level.set_pending();
        let input = binding.input;
        controller.set_pending(input, true);
        Ok(())
    }

    /// Clears a source and propagates the level to the fabric.
    pub fn lower(
        &mut self,
        source_index: u32,
        controller: &mut dyn FabricIrqController,
    ) -> IntegrationResult<()> {
        let binding = self.binding_mut(source_index, controller.input_count())?;
        binding.level.clear();
        let input = binding.input;
        controller.set_pending(input, false);
        Ok(())
    }

    fn binding_mut(&mut self, source_index: u32, inputs: u32) -> IntegrationResult<&mut Binding> {
        self.bindings
            .iter_mut()
            .find(|b| b.line.source_index == source_index)
            .ok_or(IntegrationError::UnresolvedIrq {
                index: source_index,
                name: String::new(),
                inputs,
            })
    }
}
