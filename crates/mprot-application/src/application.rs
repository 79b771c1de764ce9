//! The application registry: node types, live instances, bindings
//!
//! Requirements of the current state are always bound; bindings the current
//! state no longer needs are released on every state change. When a provider
//! disappears (scale in), breaks, or stops offering a capability, each
//! dependent edge becomes a fault that the dependent's φ may repair.

use crate::{Binding, BindingGraph, BrokenCause, Candidate, Fault, NodeInstance, PiVersion};
use indexmap::IndexMap;
use mprot_types::{
    ExecutableElement, FaultKind, InstanceId, ManagementError, ManagementResult, Node,
    ProtocolState, Requirement,
};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// capability → providers, one entry per requirement
type BindingPlan = Vec<(String, Vec<InstanceId>)>;

/// A requirement edge whose provider is gone
#[derive(Clone, Debug)]
struct Loss {
    dependent: InstanceId,
    capability: String,
    provider: InstanceId,
}

impl From<&Binding> for Loss {
    fn from(binding: &Binding) -> Self {
        Self {
            dependent: binding.dependent.clone(),
            capability: binding.capability.clone(),
            provider: binding.provider.clone(),
        }
    }
}

/// The managed system
#[derive(Clone, Debug, Default)]
pub struct Application {
    pi: PiVersion,
    /// Node types by name, in declaration order
    nodes: IndexMap<String, Arc<Node>>,
    /// Live instances, in registration order
    instances: IndexMap<InstanceId, NodeInstance>,
    bindings: BindingGraph,
}

impl Application {
    /// Create an empty application resolving bindings with `pi`
    pub fn new(pi: PiVersion) -> Self {
        Self {
            pi,
            ..Self::default()
        }
    }

    pub fn with_node(mut self, node: Node) -> ManagementResult<Self> {
        self.add_node(node)?;
        Ok(self)
    }

    /// Register a node type; names are unique
    pub fn add_node(&mut self, node: Node) -> ManagementResult<()> {
        if self.nodes.contains_key(node.name()) {
            return Err(ManagementError::RuleNotApplicable(format!(
                "node '{}' is already declared",
                node.name()
            )));
        }
        debug!(node = node.name(), "Node type registered");
        self.nodes.insert(node.name().to_string(), Arc::new(node));
        Ok(())
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn pi_version(&self) -> PiVersion {
        self.pi
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name).map(Arc::as_ref)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().map(Arc::as_ref)
    }

    /// Look up a live instance
    pub fn instance(&self, id: &InstanceId) -> ManagementResult<&NodeInstance> {
        self.instances
            .get(id)
            .ok_or_else(|| ManagementError::InstanceUnknown(id.clone()))
    }

    pub fn contains_instance(&self, id: &InstanceId) -> bool {
        self.instances.contains_key(id)
    }

    /// Live instances in registration order
    pub fn instances(&self) -> impl Iterator<Item = &NodeInstance> {
        self.instances.values()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn binding_graph(&self) -> &BindingGraph {
        &self.bindings
    }

    /// Requirement map of `id`: capability → satisfying instances
    pub fn bindings_of(&self, id: &InstanceId) -> BTreeMap<String, Vec<InstanceId>> {
        self.bindings.bindings_of(id)
    }

    /// Instances with a requirement bound to `id`
    pub fn dependents_of(&self, id: &InstanceId) -> BTreeSet<InstanceId> {
        self.bindings.dependents_of(id)
    }

    pub fn broken_instances(&self) -> Vec<&NodeInstance> {
        self.instances.values().filter(|i| i.is_broken()).collect()
    }

    pub fn is_broken(&self, id: &InstanceId) -> bool {
        self.instances.get(id).is_some_and(NodeInstance::is_broken)
    }

    // ── Actions ──────────────────────────────────────────────────────

    /// Enact one plan step
    pub fn apply(&mut self, element: &ExecutableElement) -> ManagementResult<()> {
        match element {
            ExecutableElement::ScaleOut1 {
                node_name,
                id_to_assign,
            } => self.scale_out1(node_name, id_to_assign),
            ExecutableElement::ScaleOut2 {
                node_name,
                id_to_assign,
                container_id,
            } => self.scale_out2(node_name, id_to_assign, container_id),
            ExecutableElement::ScaleIn { instance_id } => self.scale_in(instance_id),
            ExecutableElement::OpStart { instance_id, op } => self.op_start(instance_id, op),
            ExecutableElement::OpEnd { instance_id, op } => self.op_end(instance_id, op),
        }
    }

    /// Create an instance of `node_name` outside any container.
    ///
    /// Requirements of the initial state are resolved with the application's
    /// policy; a node whose initial state requires nothing starts unbound.
    pub fn scale_out1(&mut self, node_name: &str, id: &InstanceId) -> ManagementResult<()> {
        let node = self.check_new_instance(node_name, id)?;
        let requirements = node
            .protocol()
            .requirements_of(&node.initial_state())
            .to_vec();

        let plan = self
            .resolve(id, &requirements, None, None)
            .map_err(|capability| ManagementError::InstanceNotAvailable {
                instance: id.clone(),
                requirement: capability,
            })?;

        self.instances
            .insert(id.clone(), NodeInstance::new(id.clone(), node));
        self.bindings.rebind_dependent(id, plan);
        info!(instance = %id, node = node_name, "Instance created");
        Ok(())
    }

    /// Create an instance of `node_name` hosted by `container_id`.
    ///
    /// The container must satisfy at least one requirement of the initial
    /// state and is preferred for every requirement it can satisfy; the rest
    /// are resolved with the application's policy.
    pub fn scale_out2(
        &mut self,
        node_name: &str,
        id: &InstanceId,
        container_id: &InstanceId,
    ) -> ManagementResult<()> {
        let node = self.check_new_instance(node_name, id)?;
        let container = self.instance(container_id)?;

        let requirements = node
            .protocol()
            .requirements_of(&node.initial_state())
            .to_vec();
        let Some(first) = requirements.first() else {
            return Err(ManagementError::RuleNotApplicable(format!(
                "node '{}' has no initial requirement a container could satisfy",
                node_name
            )));
        };
        if !requirements
            .iter()
            .any(|r| self.can_serve(container, &r.capability))
        {
            return Err(ManagementError::InstanceNotAvailable {
                instance: container_id.clone(),
                requirement: first.capability.clone(),
            });
        }

        let plan = self
            .resolve(id, &requirements, Some(container_id), None)
            .map_err(|capability| ManagementError::InstanceNotAvailable {
                instance: container_id.clone(),
                requirement: capability,
            })?;

        let mut instance = NodeInstance::new(id.clone(), node);
        instance.set_container(Some(container_id.clone()));
        self.instances.insert(id.clone(), instance);
        self.bindings.rebind_dependent(id, plan);
        info!(instance = %id, node = node_name, container = %container_id, "Instance created");
        Ok(())
    }

    /// Remove an instance; its dependents handle the loss or break
    pub fn scale_in(&mut self, id: &InstanceId) -> ManagementResult<()> {
        self.instance(id)?;

        let losses: VecDeque<Loss> = self
            .bindings
            .provided_by(id)
            .into_iter()
            .map(Loss::from)
            .collect();
        self.bindings.release_dependent(id);
        self.instances.shift_remove(id);
        info!(instance = %id, lost_bindings = losses.len(), "Instance removed");

        self.propagate(losses);

        for instance in self.instances.values_mut() {
            if instance.container() == Some(id) {
                instance.set_container(None);
            }
        }
        Ok(())
    }

    /// Enter the pending state of the transition leaving the current state through `op`
    pub fn op_start(&mut self, id: &InstanceId, op: &str) -> ManagementResult<()> {
        let instance = self.instance(id)?;
        let transition = instance.startable_transition(op)?;
        let pending = transition.pending_state();
        let requirements = instance.node().protocol().requirements_of(&pending).to_vec();
        let container = instance.container().cloned();

        let plan = self
            .resolve(id, &requirements, container.as_ref(), None)
            .map_err(|capability| ManagementError::OperationNotStartable {
                instance: id.clone(),
                operation: op.to_string(),
                requirement: capability,
            })?;

        self.commit_state(id, pending, plan);
        debug!(instance = %id, transition = %transition.id(), "Operation started");
        Ok(())
    }

    /// Commit the pending transition started with `op`.
    ///
    /// If the target state's requirements cannot be satisfied the instance is
    /// left broken and `FailedOperation` is returned.
    pub fn op_end(&mut self, id: &InstanceId, op: &str) -> ManagementResult<()> {
        let instance = self.instance(id)?;
        let transition = instance.endable_transition(op)?;
        let target = ProtocolState::stable(transition.target());
        let requirements = instance.node().protocol().requirements_of(&target).to_vec();
        let container = instance.container().cloned();

        match self.resolve(id, &requirements, container.as_ref(), None) {
            Ok(plan) => {
                self.commit_state(id, target, plan);
                debug!(instance = %id, transition = %transition.id(), "Operation completed");
                Ok(())
            }
            Err(capability) => {
                let cause = BrokenCause::FailedOperation {
                    transition: transition.id().clone(),
                    capability: capability.clone(),
                };
                let mut queue = VecDeque::new();
                self.break_instance(id, cause, &mut queue);
                self.propagate(queue);
                Err(ManagementError::FailedOperation {
                    instance: id.clone(),
                    operation: op.to_string(),
                    requirement: capability,
                })
            }
        }
    }

    /// Re-resolve the requirements of a broken instance and clear its broken mark
    pub fn repair(&mut self, id: &InstanceId) -> ManagementResult<()> {
        let instance = self.instance(id)?;
        if !instance.is_broken() {
            return Err(ManagementError::RuleNotApplicable(format!(
                "instance {} is not broken",
                id
            )));
        }
        let requirements = instance.requirements().to_vec();
        let container = instance.container().cloned();

        let plan = self
            .resolve(id, &requirements, container.as_ref(), None)
            .map_err(|capability| ManagementError::InstanceNotAvailable {
                instance: id.clone(),
                requirement: capability,
            })?;

        self.bindings.rebind_dependent(id, plan);
        if let Some(instance) = self.instances.get_mut(id) {
            instance.clear_broken();
        }
        info!(instance = %id, "Instance repaired");
        Ok(())
    }

    // ── Resolution ───────────────────────────────────────────────────

    fn check_new_instance(&self, node_name: &str, id: &InstanceId) -> ManagementResult<Arc<Node>> {
        let node = self
            .nodes
            .get(node_name)
            .cloned()
            .ok_or_else(|| ManagementError::NodeUnknown(node_name.to_string()))?;
        if self.instances.contains_key(id) {
            return Err(ManagementError::AlreadyUsedId(id.clone()));
        }
        Ok(node)
    }

    /// Whether `provider` can take one more binding on `capability`
    fn can_serve(&self, provider: &NodeInstance, capability: &str) -> bool {
        match provider.offer(capability) {
            Some(offer) => match offer.capacity {
                Some(capacity) => self.bindings.load(provider.id(), capability) < capacity as usize,
                None => true,
            },
            None => false,
        }
    }

    /// Bind every requirement of `dependent`.
    ///
    /// Existing bindings that are still valid are kept; missing providers are
    /// chosen by the policy among eligible instances. Returns the first
    /// unsatisfiable capability on failure.
    fn resolve(
        &self,
        dependent: &InstanceId,
        requirements: &[Requirement],
        prefer: Option<&InstanceId>,
        exclude: Option<&InstanceId>,
    ) -> Result<BindingPlan, String> {
        let resolver = self.pi.resolver();
        let mut plan = Vec::with_capacity(requirements.len());

        for requirement in requirements {
            let needed = requirement.multiplicity as usize;
            let kept: Vec<InstanceId> = self
                .bindings
                .providers_of(dependent, &requirement.capability)
                .into_iter()
                .filter(|p| Some(*p) != exclude)
                .filter(|p| {
                    self.instances
                        .get(*p)
                        .is_some_and(|i| i.offer(&requirement.capability).is_some())
                })
                .take(needed)
                .cloned()
                .collect();

            let candidates: Vec<Candidate<'_>> = self
                .instances
                .values()
                .filter(|i| i.id() != dependent && Some(i.id()) != exclude)
                .filter(|i| !kept.contains(i.id()))
                .filter(|i| self.can_serve(i, &requirement.capability))
                .map(|i| Candidate {
                    id: i.id(),
                    preferred: Some(i.id()) == prefer,
                })
                .collect();

            let chosen = resolver
                .choose(requirement, needed - kept.len(), &candidates)
                .ok_or_else(|| requirement.capability.clone())?;

            let mut providers = kept;
            providers.extend(chosen);
            plan.push((requirement.capability.clone(), providers));
        }

        Ok(plan)
    }

    /// Move `id` to `state` with `plan` as its bindings, then propagate any
    /// capability the new state no longer offers
    fn commit_state(&mut self, id: &InstanceId, state: ProtocolState, plan: BindingPlan) {
        self.bindings.rebind_dependent(id, plan);
        if let Some(instance) = self.instances.get_mut(id) {
            instance.enter(state);
        }
        let withdrawn = self.withdrawn(id);
        self.propagate(withdrawn);
    }

    /// Edges served by `provider` for capabilities it does not offer any more
    fn withdrawn(&self, provider: &InstanceId) -> VecDeque<Loss> {
        let Some(instance) = self.instances.get(provider) else {
            return VecDeque::new();
        };
        self.bindings
            .provided_by(provider)
            .into_iter()
            .filter(|b| instance.offer(&b.capability).is_none())
            .map(Loss::from)
            .collect()
    }

    // ── Fault propagation ────────────────────────────────────────────

    /// Handle lost bindings until no new loss appears.
    ///
    /// Each dependent either rebinds (handler present, alternative found),
    /// falls back to the handler's recovery state (at most once per
    /// propagation), or breaks; a broken instance offers nothing, so its own
    /// dependents are queued in turn.
    fn propagate(&mut self, mut queue: VecDeque<Loss>) {
        let mut recovered: HashSet<InstanceId> = HashSet::new();

        while let Some(loss) = queue.pop_front() {
            if !self
                .bindings
                .remove(&loss.dependent, &loss.capability, &loss.provider)
            {
                continue;
            }
            let Some(instance) = self.instances.get(&loss.dependent) else {
                continue;
            };
            if instance.is_broken() {
                continue;
            }
            let Some(requirement) = instance
                .requirements()
                .iter()
                .find(|r| r.capability == loss.capability)
                .cloned()
            else {
                continue;
            };

            let kind = if instance.container() == Some(&loss.provider) {
                FaultKind::ContainerLost
            } else {
                FaultKind::DependencyLost
            };
            let handler = instance
                .node()
                .protocol()
                .handler_for(instance.state(), kind)
                .cloned();
            let fault = Fault {
                instance: loss.dependent.clone(),
                capability: loss.capability.clone(),
                lost_provider: loss.provider.clone(),
                kind,
                handled: handler.is_some(),
            };
            debug!(%fault, "Fault raised");

            let Some(handler) = handler else {
                self.break_instance(&loss.dependent, BrokenCause::Fault(fault), &mut queue);
                continue;
            };

            if self.rebind(&loss.dependent, &requirement, &loss.provider, kind) {
                continue;
            }
            if let Some(recovery) = &handler.recovery {
                if recovered.insert(loss.dependent.clone()) {
                    if let Some(withdrawn) = self.recover(&loss.dependent, recovery, &loss.provider)
                    {
                        queue.extend(withdrawn);
                        continue;
                    }
                }
            }
            self.break_instance(&loss.dependent, BrokenCause::Fault(fault), &mut queue);
        }
    }

    /// Find replacement providers for one requirement, avoiding `lost`
    fn rebind(
        &mut self,
        dependent: &InstanceId,
        requirement: &Requirement,
        lost: &InstanceId,
        kind: FaultKind,
    ) -> bool {
        let requirements = std::slice::from_ref(requirement);
        let plan = match self.resolve(dependent, requirements, None, Some(lost)) {
            Ok(plan) => plan,
            Err(_) => return false,
        };

        for (capability, providers) in plan {
            let bound: Vec<InstanceId> = self
                .bindings
                .providers_of(dependent, &capability)
                .into_iter()
                .cloned()
                .collect();
            let replacements: Vec<InstanceId> = providers
                .into_iter()
                .filter(|p| !bound.contains(p))
                .collect();

            if kind == FaultKind::ContainerLost {
                if let Some(instance) = self.instances.get_mut(dependent) {
                    instance.set_container(replacements.first().cloned());
                }
            }
            for provider in replacements {
                debug!(
                    instance = %dependent,
                    capability = %capability,
                    provider = %provider,
                    "Requirement rebound"
                );
                self.bindings.add(Binding {
                    dependent: dependent.clone(),
                    capability: capability.clone(),
                    provider,
                });
            }
        }
        true
    }

    /// Move `dependent` to the stable `state` of a fault handler.
    ///
    /// Returns the losses caused by capabilities `state` no longer offers, or
    /// `None` when `state`'s own requirements cannot be satisfied.
    fn recover(
        &mut self,
        dependent: &InstanceId,
        state: &str,
        lost: &InstanceId,
    ) -> Option<VecDeque<Loss>> {
        let instance = self.instances.get(dependent)?;
        let target = ProtocolState::stable(state);
        let requirements = instance.node().protocol().requirements_of(&target).to_vec();
        let container = instance.container().filter(|c| *c != lost).cloned();

        let plan = self
            .resolve(dependent, &requirements, container.as_ref(), Some(lost))
            .ok()?;

        self.bindings.rebind_dependent(dependent, plan);
        self.instances.get_mut(dependent)?.enter(target);
        info!(instance = %dependent, state, "Instance recovered through fault handler");
        Some(self.withdrawn(dependent))
    }

    fn break_instance(&mut self, id: &InstanceId, cause: BrokenCause, queue: &mut VecDeque<Loss>) {
        if let Some(instance) = self.instances.get_mut(id) {
            warn!(instance = %id, %cause, "Instance broken");
            instance.mark_broken(cause);
        }
        queue.extend(self.bindings.provided_by(id).into_iter().map(Loss::from));
    }
}
