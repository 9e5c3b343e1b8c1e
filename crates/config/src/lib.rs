// CorePlug - CPU Core Integration Layer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Default schema version for YAML descriptors
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_settle_cycles() -> u32 {
    2
}

/// Kind of CPU memory port exposed by a core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    #[serde(alias = "ibus")]
    Instruction,
    #[serde(alias = "dbus")]
    Data,
    Unified,
}

/// Geometry of a native bus handshake as declared by the CPU core:
/// address and data widths in bits, plus the byte-enable mask width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeGeometry {
    pub address_width: u8,
    pub data_width: u8,
    /// Byte-enable mask width; must equal `data_width / 8`.
    pub granularity: u8,
}

/// A fixed address region, e.g. the core's memory-mapped I/O window.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemoryRange {
    pub base: u64,
    pub size: String, // e.g. "2GiB"
}

/// One CPU memory port and the address window it needs from the SoC
/// generator's memory map.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PortConfig {
    pub kind: PortKind,
    pub window_size: String, // e.g. "64KiB"
}

/// One interrupt pin exposed by the CPU core.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IrqPinConfig {
    pub index: u32,
    pub name: String,
    #[serde(default)]
    pub priority: u8,
}

/// Toolchain parameters the integration hands to the firmware build:
/// base ISA string, ABI, and an optional core-identifying define.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ToolchainConfig {
    pub base_isa: String, // e.g. "rv32i"
    pub abi: String,      // e.g. "ilp32"
    #[serde(default)]
    pub define: Option<String>, // e.g. "__neorv32__"
}

/// Descriptor of an external CPU core: everything the integration layer
/// consumes from the core side (native handshake geometry, IRQ pins,
/// variant presets, toolchain parameters).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CoreDescriptor {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    pub handshake: HandshakeGeometry,
    pub ports: Vec<PortConfig>,
    #[serde(default)]
    pub irq_pins: Vec<IrqPinConfig>,
    /// Extra named variants beyond the built-in presets; each maps a
    /// variant name to the feature names it enables.
    #[serde(default)]
    pub variants: HashMap<String, Vec<String>>,
    pub reset_vector: u64,
    #[serde(default)]
    pub io_region: Option<MemoryRange>,
    pub toolchain: ToolchainConfig,
}

impl CoreDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading core descriptor: {:?}", path);
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read core descriptor at {:?}", path))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let desc: Self = serde_yaml::from_str(yaml).context("Failed to parse Core Descriptor")?;
        desc.validate()?;
        Ok(desc)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.name.trim().is_empty() {
            anyhow::bail!("Core 'name' cannot be empty");
        }

        if self.ports.is_empty() {
            anyhow::bail!("Core '{}' declares no bus ports", self.name);
        }

        self.handshake.validate()?;

        for port in &self.ports {
            parse_size(&port.window_size).with_context(|| {
                format!("Invalid window_size for {:?} port of '{}'", port.kind, self.name)
            })?;
        }

        if let Some(io) = &self.io_region {
            parse_size(&io.size)
                .with_context(|| format!("Invalid io_region size for '{}'", self.name))?;
        }

        if self.toolchain.base_isa.trim().is_empty() {
            anyhow::bail!("Toolchain 'base_isa' cannot be empty");
        }

        Ok(())
    }
}

impl HandshakeGeometry {
    pub fn validate(&self) -> Result<()> {
        if self.address_width == 0 || self.address_width > 64 {
            anyhow::bail!(
                "Handshake address_width must be 1..=64, got {}",
                self.address_width
            );
        }
        match self.data_width {
            8 | 16 | 32 | 64 => {}
            other => anyhow::bail!("Handshake data_width must be 8/16/32/64, got {}", other),
        }
        if u16::from(self.granularity) * 8 != u16::from(self.data_width) {
            anyhow::bail!(
                "Handshake granularity {} does not match data_width {} (expected {})",
                self.granularity,
                self.data_width,
                self.data_width / 8
            );
        }
        Ok(())
    }
}

/// Declared widths of the SoC fabric's bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricBusConfig {
    pub address_width: u8,
    pub data_width: u8,
}

/// One reset/clock domain in the fabric, with the domains it depends on.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResetDomainConfig {
    pub id: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Descriptor of the SoC fabric side: bus widths, interrupt inputs, and the
/// reset-domain registry the sequencer orders against.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FabricDescriptor {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub name: String,
    pub bus: FabricBusConfig,
    pub irq_inputs: u32,
    #[serde(default)]
    pub reset_domains: Vec<ResetDomainConfig>,
    /// Reset domains the CPU unit attaches to; its reset is released only
    /// after all of these.
    #[serde(default)]
    pub cpu_dependencies: Vec<String>,
    /// Cycles to wait after each reset release before the next action.
    #[serde(default = "default_settle_cycles")]
    pub settle_cycles: u32,
}

impl FabricDescriptor {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading fabric descriptor: {:?}", path);
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fabric descriptor at {:?}", path))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let desc: Self = serde_yaml::from_str(yaml).context("Failed to parse Fabric Descriptor")?;
        desc.validate()?;
        Ok(desc)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != "1.0" {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '1.0'",
                self.schema_version
            );
        }

        if self.name.trim().is_empty() {
            anyhow::bail!("Fabric 'name' cannot be empty");
        }

        if self.bus.address_width == 0 || self.bus.address_width > 64 {
            anyhow::bail!(
                "Fabric address_width must be 1..=64, got {}",
                self.bus.address_width
            );
        }
        match self.bus.data_width {
            8 | 16 | 32 | 64 => {}
            other => anyhow::bail!("Fabric data_width must be 8/16/32/64, got {}", other),
        }

        let mut seen = std::collections::HashSet::new();
        for domain in &self.reset_domains {
            if !seen.insert(domain.id.as_str()) {
                anyhow::bail!("Reset domain '{}' is declared twice", domain.id);
            }
        }

        Ok(())
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
