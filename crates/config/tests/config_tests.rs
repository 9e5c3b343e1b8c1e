// CorePlug - CPU Core Integration Layer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use coreplug_config::{CoreDescriptor, FabricDescriptor, PortKind};

#[test]
fn minimal_core_yaml_parses_with_defaults() {
    let yaml = r#"
name: "picocore"
handshake:
  address_width: 32
  data_width: 32
  granularity: 4
ports:
  - kind: unified
    window_size: "32KiB"
reset_vector: 0x0
toolchain:
  base_isa: "rv32i"
  abi: "ilp32"
"#;
    let desc: CoreDescriptor = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(desc.schema_version, "1.0");
    assert_eq!(desc.ports[0].kind, PortKind::Unified);
    assert!(desc.irq_pins.is_empty());
    assert!(desc.variants.is_empty());
    assert!(desc.io_region.is_none());
    assert!(desc.toolchain.define.is_none());
    assert!(desc.validate().is_ok());
}

#[test]
fn port_kind_aliases_parse() {
    let yaml = r#"
name: "neorv32"
handshake:
  address_width: 32
  data_width: 32
  granularity: 4
ports:
  - kind: ibus
    window_size: "64KiB"
  - kind: dbus
    window_size: "64KiB"
reset_vector: 0x0
toolchain:
  base_isa: "rv32i"
  abi: "ilp32"
"#;
    let desc: CoreDescriptor = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(desc.ports[0].kind, PortKind::Instruction);
    assert_eq!(desc.ports[1].kind, PortKind::Data);
}

#[test]
fn core_variants_and_irq_fields_parse() {
    let yaml = r#"
name: "neorv32"
handshake:
  address_width: 32
  data_width: 32
  granularity: 4
ports:
  - kind: unified
    window_size: "64KiB"
irq_pins:
  - index: 0
    name: "mtime"
  - index: 1
    name: "uart"
    priority: 3
variants:
  lite: ["compressed"]
reset_vector: 0x80000000
toolchain:
  base_isa: "rv32i"
  abi: "ilp32"
  define: "__neorv32__"
"#;
    let desc: CoreDescriptor = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(desc.irq_pins[0].priority, 0);
    assert_eq!(desc.irq_pins[1].priority, 3);
    assert_eq!(desc.variants["lite"], vec!["compressed"]);
    assert_eq!(desc.reset_vector, 0x8000_0000);
}

#[test]
fn fabric_yaml_parses_with_defaults() {
    let yaml = r#"
name: "litex-soc"
bus:
  address_width: 32
  data_width: 32
irq_inputs: 32
"#;
    let desc: FabricDescriptor = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(desc.schema_version, "1.0");
    assert!(desc.reset_domains.is_empty());
    assert!(desc.cpu_dependencies.is_empty());
    assert_eq!(desc.settle_cycles, 2);
    assert!(desc.validate().is_ok());
}

#[test]
fn fabric_reset_domains_parse() {
    let yaml = r#"
name: "litex-soc"
bus:
  address_width: 32
  data_width: 32
irq_inputs: 8
reset_domains:
  - id: "bus_fabric"
  - id: "dram_ctrl"
    depends_on: ["bus_fabric"]
cpu_dependencies: ["dram_ctrl"]
settle_cycles: 4
"#;
    let desc: FabricDescriptor = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(desc.reset_domains[1].depends_on, vec!["bus_fabric"]);
    assert_eq!(desc.settle_cycles, 4);
}
