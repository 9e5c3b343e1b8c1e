// CorePlug - CPU Core Integration Layer
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use crate::{IntegrationError, IntegrationResult, ResetActuator};
use coreplug_config::ResetDomainConfig;
use std::collections::{HashMap, HashSet};

/// One resettable component and the components whose reset release must
/// happen before its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetDomain {
    pub id: String,
    pub depends_on: Vec<String>,
}

impl From<&ResetDomainConfig> for ResetDomain {
    fn from(cfg: &ResetDomainConfig) -> Self {
        Self {
            id: cfg.id.clone(),
            depends_on: cfg.depends_on.clone(),
        }
    }
}

/// One step of a reset sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetAction {
    Assert { id: String },
    Release { id: String },
    Wait { cycles: u32 },
}

/// An ordered reset sequence: assert every component, then release in
/// dependency order with a settle wait after each release.
///
/// Constructed once per build by [`ResetSequencer::build_plan`] and
/// immutable thereafter; warm resets re-execute the same plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetPlan {
    actions: Vec<ResetAction>,
    release_order: Vec<String>,
}

impl ResetPlan {
    pub fn actions(&self) -> &[ResetAction] {
        &self.actions
    }

    /// Component ids in the order their resets are released.
    pub fn release_order(&self) -> &[String] {
        &self.release_order
    }

    pub fn release_position(&self, id: &str) -> Option<usize> {
        self.release_order.iter().position(|d| d == id)
    }
}

/// Builds and executes dependency-ordered reset plans.
#[derive(Debug, Clone, Copy)]
pub struct ResetSequencer {
    settle_cycles: u32,
}

impl ResetSequencer {
    pub fn new(settle_cycles: u32) -> Self {
        Self { settle_cycles }
    }

    /// Computes the release order for `domains`.
    ///
    /// A component's reset is released strictly after every component it
    /// depends on (dependency order, not declaration order). A dependency
    /// on an undeclared component fails with `UnresolvedDependency`; a
    /// dependency cycle fails with `DependencyCycle` and produces no plan.
    pub fn build_plan(&self, domains: &[ResetDomain]) -> IntegrationResult<ResetPlan> {
        let by_id: HashMap<&str, &ResetDomain> =
            domains.iter().map(|d| (d.id.as_str(), d)).collect();

        for domain in domains {
            for dep in &domain.depends_on {
                if !by_id.contains_key(dep.as_str()) {
                    return Err(IntegrationError::UnresolvedDependency {
                        id: dep.clone(),
                        wanted_by: domain.id.clone(),
                    });
                }
            }
        }

        fn visit<'a>(
            by_id: &HashMap<&str, &'a ResetDomain>,
            domain: &'a ResetDomain,
            visited: &mut HashSet<&'a str>,
            stack: &mut HashSet<&'a str>,
            order: &mut Vec<String>,
        ) -> IntegrationResult<()> {
            if stack.contains(domain.id.as_str()) {
                return Err(IntegrationError::DependencyCycle {
                    via: domain.id.clone(),
                });
            }
            if visited.contains(domain.id.as_str()) {
                return Ok(());
            }

            visited.insert(domain.id.as_str());
            stack.insert(domain.id.as_str());

            for dep in &domain.depends_on {
                // Presence checked above.
                if let Some(&next) = by_id.get(dep.as_str()) {
                    visit(by_id, next, visited, stack, order)?;
                }
            }

            stack.remove(domain.id.as_str());
            order.push(domain.id.clone());
            Ok(())
        }

        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        let mut release_order = Vec::with_capacity(domains.len());
        for domain in domains {
            visit(&by_id, domain, &mut visited, &mut stack, &mut release_order)?;
        }

        let mut actions = Vec::with_capacity(domains.len() * 2 + release_order.len());
        for domain in domains {
            actions.push(ResetAction::Assert {
                id: domain.id.clone(),
            });
        }
        for id in &release_order {
            actions.push(ResetAction::Release { id: id.clone() });
            if self.settle_cycles > 0 {
                actions.push(ResetAction::Wait {
                    cycles: self.settle_cycles,
                });
            }
        }

        tracing::debug!("Reset release order: [{}]", release_order.join(", "));

        Ok(ResetPlan {
            actions,
            release_order,
        })
    }

    /// Drives the actuator through the plan, strictly in order.
    ///
    /// Synchronous and non-preemptible: it either runs to completion or
    /// fails outright. On a mid-plan failure every component's reset is
    /// re-asserted before the error is surfaced, so no component is left in
    /// an undefined power state.
    pub fn execute(
        &self,
        plan: &ResetPlan,
        actuator: &mut dyn ResetActuator,
    ) -> IntegrationResult<()> {
        for action in &plan.actions {
            let result = match action {
                ResetAction::Assert { id } => actuator.assert_reset(id),
                ResetAction::Release { id } => actuator.release_reset(id),
                ResetAction::Wait { cycles } => actuator.wait_cycles(*cycles),
            };

            if let Err(err) = result {
                tracing::warn!("Reset plan failed at {:?}; re-asserting all domains", action);
                for id in &plan.release_order {
                    if let Err(rollback_err) = actuator.assert_reset(id) {
                        tracing::warn!("Rollback assert of '{}' failed: {}", id, rollback_err);
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }
}
