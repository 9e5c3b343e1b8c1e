// CorePlug - CPU Core Integration Layer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{IntegrationError, IntegrationResult};
use coreplug_config::ToolchainConfig;
use std::collections::{BTreeMap, HashMap};

bitflags::bitflags! {
    /// Optional synthesis-time CPU features.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FeatureSet: u8 {
        const MULTIPLIER      = 1 << 0;
        const COMPRESSED      = 1 << 1;
        const DEBUG_UNIT      = 1 << 2;
        const FAST_INTERRUPTS = 1 << 3;
    }
}

const FEATURE_NAMES: [(&str, FeatureSet); 4] = [
    ("multiplier", FeatureSet::MULTIPLIER),
    ("compressed", FeatureSet::COMPRESSED),
    ("debug_unit", FeatureSet::DEBUG_UNIT),
    ("fast_interrupts", FeatureSet::FAST_INTERRUPTS),
];

impl FeatureSet {
    pub fn from_feature_name(name: &str) -> Option<FeatureSet> {
        FEATURE_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, f)| *f)
    }

    /// Names of the features present in this set, in declaration order.
    pub fn names(self) -> Vec<&'static str> {
        FEATURE_NAMES
            .iter()
            .filter(|(_, f)| self.contains(*f))
            .map(|(n, _)| *n)
            .collect()
    }
}

/// A resolved CPU configuration. Immutable once built: created by
/// [`VariantResolver::resolve`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuVariant {
    name: String,
    features: FeatureSet,
}

impl CpuVariant {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> FeatureSet {
        self.features
    }

    pub fn has(&self, feature: FeatureSet) -> bool {
        self.features.contains(feature)
    }

    /// ISA string for the toolchain, e.g. `rv32i` -> `rv32imc`.
    ///
    /// Extension letters follow the canonical RISC-V order (m before c).
    /// Debug unit and fast interrupts are synthesis parameters, not ISA
    /// extensions, and never appear here.
    pub fn march(&self, base_isa: &str) -> String {
        let mut isa = base_isa.to_string();
        if self.features.contains(FeatureSet::MULTIPLIER) {
            isa.push('m');
        }
        if self.features.contains(FeatureSet::COMPRESSED) {
            isa.push('c');
        }
        isa
    }

    /// Compiler flags for firmware targeting this variant.
    pub fn gcc_flags(&self, toolchain: &ToolchainConfig) -> String {
        let mut flags = format!(
            "-march={} -mabi={}",
            self.march(&toolchain.base_isa),
            toolchain.abi
        );
        if let Some(define) = &toolchain.define {
            flags.push_str(&format!(" -D{}", define));
        }
        flags
    }
}

/// Resolves a named variant plus per-feature overrides into a [`CpuVariant`].
///
/// Holds the preset table explicitly (no global registry): built-in presets
/// plus any extra variants the core descriptor declares.
#[derive(Debug, Clone)]
pub struct VariantResolver {
    presets: BTreeMap<String, FeatureSet>,
}

impl VariantResolver {
    /// Built-in preset table.
    pub fn builtin() -> Self {
        let mut presets = BTreeMap::new();
        presets.insert("minimal".to_string(), FeatureSet::empty());
        presets.insert(
            "standard".to_string(),
            FeatureSet::MULTIPLIER | FeatureSet::COMPRESSED,
        );
        presets.insert("full".to_string(), FeatureSet::all());
        presets.insert(
            "debug".to_string(),
            FeatureSet::MULTIPLIER | FeatureSet::COMPRESSED | FeatureSet::DEBUG_UNIT,
        );
        Self { presets }
    }

    /// Built-in presets extended with the extra variants a core descriptor
    /// declares. An unrecognized feature name in a declared variant fails
    /// with `UnknownFeature`.
    pub fn with_extra_variants(extra: &HashMap<String, Vec<String>>) -> IntegrationResult<Self> {
        let mut resolver = Self::builtin();
        // BTreeMap ordering keeps descriptor iteration deterministic.
        let sorted: BTreeMap<_, _> = extra.iter().collect();
        for (name, features) in sorted {
            resolver.add_preset(name, features)?;
        }
        Ok(resolver)
    }

    pub fn add_preset(&mut self, name: &str, features: &[String]) -> IntegrationResult<()> {
        let mut set = FeatureSet::empty();
        for feature in features {
            let flag = FeatureSet::from_feature_name(feature).ok_or_else(|| {
                IntegrationError::UnknownFeature {
                    name: feature.clone(),
                }
            })?;
            set |= flag;
        }
        self.presets.insert(name.to_string(), set);
        Ok(())
    }

    pub fn known_variants(&self) -> String {
        self.presets
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Resolve `name` then apply `overrides` feature-by-feature; explicit
    /// overrides always win over preset defaults. Deterministic: the same
    /// inputs always yield the same [`CpuVariant`].
    pub fn resolve(
        &self,
        name: &str,
        overrides: &BTreeMap<String, bool>,
    ) -> IntegrationResult<CpuVariant> {
        let preset = self
            .presets
            .get(name)
            .copied()
            .ok_or_else(|| IntegrationError::UnknownVariant {
                name: name.to_string(),
                known: self.known_variants(),
            })?;

        let mut features = preset;
        for (feature, enabled) in overrides {
            let flag = FeatureSet::from_feature_name(feature).ok_or_else(|| {
                IntegrationError::UnknownFeature {
                    name: feature.clone(),
                }
            })?;
            features.set(flag, *enabled);
        }

        tracing::debug!(
            "Resolved variant '{}' -> features [{}]",
            name,
            features.names().join(", ")
        );

        Ok(CpuVariant {
            name: name.to_string(),
            features,
        })
    }
}
