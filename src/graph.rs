//! Strongly-connected components of the predicate dependency graph.
//!
//! Kosaraju's algorithm: a postorder DFS over the reversed graph fixes the
//! component discovery order, a second sweep over the forward graph collects
//! the components. With `edges_out[n]` holding the nodes `n` depends on, the
//! resulting component list is already topologically sorted: every component
//! appears after the components it depends on.

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Debug)]
pub struct Graph {
    // Indexed by NodeId
    pub edges_out: Vec<Vec<NodeId>>,
}

impl Graph {
    pub fn num_nodes(&self) -> usize {
        self.edges_out.len()
    }
}

fn reversed(graph: &Graph) -> Graph {
    let mut edges_in = vec![Vec::new(); graph.num_nodes()];
    for (src, dests) in graph.edges_out.iter().enumerate() {
        for &NodeId(dest) in dests {
            edges_in[dest].push(NodeId(src));
        }
    }
    Graph {
        edges_out: edges_in,
    }
}

fn dfs_postorder(graph: &Graph) -> Vec<NodeId> {
    enum Action {
        Enter(NodeId),
        Emit(NodeId),
    }

    let mut visited = vec![false; graph.num_nodes()];
    let mut order = Vec::with_capacity(graph.num_nodes());
    let mut stack: Vec<Action> = (0..graph.num_nodes()).map(|n| Action::Enter(NodeId(n))).collect();

    while let Some(action) = stack.pop() {
        match action {
            Action::Enter(node) => {
                if visited[node.0] {
                    continue;
                }
                visited[node.0] = true;
                stack.push(Action::Emit(node));
                for &succ in &graph.edges_out[node.0] {
                    if !visited[succ.0] {
                        stack.push(Action::Enter(succ));
                    }
                }
            }
            Action::Emit(node) => order.push(node),
        }
    }

    order
}

/// Decomposes `graph` into strongly-connected components, dependencies
/// before dependents.
pub fn strongly_connected(graph: &Graph) -> Vec<Vec<NodeId>> {
    let discovery_order = dfs_postorder(&reversed(graph));

    let mut assigned = vec![false; graph.num_nodes()];
    let mut components = Vec::new();

    for &root in discovery_order.iter().rev() {
        if assigned[root.0] {
            continue;
        }

        let mut component = Vec::new();
        let mut pending = vec![root];
        while let Some(node) = pending.pop() {
            if assigned[node.0] {
                continue;
            }
            assigned[node.0] = true;
            component.push(node);
            for &succ in &graph.edges_out[node.0] {
                if !assigned[succ.0] {
                    pending.push(succ);
                }
            }
        }

        components.push(component);
    }

    components
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::BTreeSet;

    fn covers_every_node_once(graph: &Graph, components: &[Vec<NodeId>]) -> bool {
        let mut seen = vec![false; graph.num_nodes()];
        for component in components {
            for &NodeId(node) in component {
                if seen[node] {
                    return false;
                }
                seen[node] = true;
            }
        }
        seen.into_iter().all(|flag| flag)
    }

    fn dependencies_precede_dependents(graph: &Graph, components: &[Vec<NodeId>]) -> bool {
        let mut emitted = vec![false; graph.num_nodes()];
        for component in components {
            for &NodeId(node) in component {
                emitted[node] = true;
            }
            for &NodeId(node) in component {
                if graph.edges_out[node].iter().any(|dep| !emitted[dep.0]) {
                    return false;
                }
            }
        }
        true
    }

    fn mutually_reachable(graph: &Graph, component: &[NodeId]) -> bool {
        let members: BTreeSet<_> = component.iter().copied().collect();
        component.iter().all(|&start| {
            let mut reached = BTreeSet::new();
            reached.insert(start);
            let mut fringe = vec![start];
            while let Some(node) = fringe.pop() {
                for &succ in &graph.edges_out[node.0] {
                    if members.contains(&succ) && reached.insert(succ) {
                        fringe.push(succ);
                    }
                }
            }
            reached == members
        })
    }

    fn assert_valid_decomposition(graph: &Graph, components: &[Vec<NodeId>]) {
        assert!(covers_every_node_once(graph, components));
        assert!(dependencies_precede_dependents(graph, components));
        for component in components {
            assert!(mutually_reachable(graph, component));
        }
    }

    #[test]
    fn self_loop_is_its_own_component() {
        // 0 -> 0, 1 -> 0
        let graph = Graph {
            edges_out: vec![vec![NodeId(0)], vec![NodeId(0)]],
        };
        let components = strongly_connected(&graph);
        assert_eq!(components, vec![vec![NodeId(0)], vec![NodeId(1)]]);
    }

    #[test]
    fn cycle_collapses() {
        // 0 <-> 1, 2 -> 1
        let graph = Graph {
            edges_out: vec![vec![NodeId(1)], vec![NodeId(0)], vec![NodeId(1)]],
        };
        let components = strongly_connected(&graph);
        assert_eq!(components.len(), 2);
        let mut first = components[0].clone();
        first.sort();
        assert_eq!(first, vec![NodeId(0), NodeId(1)]);
        assert_eq!(components[1], vec![NodeId(2)]);
    }

    #[test]
    fn random_graphs_decompose_validly() {
        use rand::distributions::{Distribution, Uniform};
        use rand::SeedableRng;
        use rand_distr::Exp;
        use rand_pcg::Pcg64Mcg;

        // Seed fixed once so failures reproduce
        let mut gen = Pcg64Mcg::seed_from_u64(0x7bd8_52a5_10e2_4c01);

        const NUM_NODES: usize = 24;
        const NUM_TESTS_PER_CFG: u32 = 40;

        for &mean_edges in &[0.1, 1.0, 4.0, 8.0] {
            for _ in 0..NUM_TESTS_PER_CFG {
                let mut graph = Graph {
                    edges_out: vec![Vec::new(); NUM_NODES],
                };

                for node_edges in graph.edges_out.iter_mut() {
                    let count = Exp::new(1.0 / mean_edges).unwrap().sample(&mut gen) as u32;
                    for _ in 0..count {
                        node_edges.push(NodeId(Uniform::new(0, NUM_NODES).sample(&mut gen)));
                    }
                }

                let components = strongly_connected(&graph);
                assert_valid_decomposition(&graph, &components);
            }
        }
    }
}
