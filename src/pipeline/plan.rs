use super::executor::{InputSlot, StageSlot};
use super::id::{ConsumerId, PortId, StageId};
use super::port::Port;

/// Upstream closure of one stage, ready to be executed in order.
#[derive(Debug, Clone, Default)]
pub struct PullPlan {
    /// Stages in dependency order; the root comes last.
    pub order: Vec<StageId>,
    /// Every (port, consumer) edge inside the closure.
    pub edges: Vec<(PortId, ConsumerId)>,
}

impl PullPlan {
    /// Consumers inside this pull reading from `port`.
    pub fn consumers_of(&self, port: PortId) -> impl Iterator<Item = ConsumerId> + '_ {
        self.edges
            .iter()
            .filter(move |(p, _)| *p == port)
            .map(|(_, c)| *c)
    }
}

/// Computes pull orders and answers reachability queries over stage bindings.
///
/// Both walks use an explicit stack, so arbitrarily long chains never grow
/// the call stack.
pub struct PullPlanner;

impl PullPlanner {
    /// Depth-first postorder over everything `root` transitively reads from.
    pub fn plan(stages: &[StageSlot], ports: &[Port], root: StageId) -> PullPlan {
        let mut plan = PullPlan::default();
        let mut visited = vec![false; stages.len()];
        let mut stack = vec![(root, false)];

        while let Some((stage, expanded)) = stack.pop() {
            if expanded {
                plan.order.push(stage);
                continue;
            }
            let Some(slot) = stages.get(stage.index()) else {
                continue;
            };
            if visited[stage.index()] {
                continue;
            }
            visited[stage.index()] = true;
            stack.push((stage, true));

            for (input, port) in Self::bound_ports(slot) {
                plan.edges.push((port, ConsumerId::Stage { stage, input }));
                if let Some(producer) = ports.get(port.index()).map(Port::producer) {
                    if !visited[producer.index()] {
                        stack.push((producer, false));
                    }
                }
            }
        }

        plan
    }

    /// Whether `target` is `from` or lies upstream of it.
    pub fn reaches_upstream(
        stages: &[StageSlot],
        ports: &[Port],
        from: StageId,
        target: StageId,
    ) -> bool {
        let mut visited = vec![false; stages.len()];
        let mut stack = vec![from];

        while let Some(stage) = stack.pop() {
            if stage == target {
                return true;
            }
            let Some(slot) = stages.get(stage.index()) else {
                continue;
            };
            if std::mem::replace(&mut visited[stage.index()], true) {
                continue;
            }
            for (_, port) in Self::bound_ports(slot) {
                if let Some(port) = ports.get(port.index()) {
                    stack.push(port.producer());
                }
            }
        }

        false
    }

    fn bound_ports(slot: &StageSlot) -> impl Iterator<Item = (usize, PortId)> + '_ {
        slot.inputs
            .iter()
            .enumerate()
            .filter_map(|(index, input)| match input {
                InputSlot::Port(port) => Some((index, *port)),
                _ => None,
            })
    }
}
