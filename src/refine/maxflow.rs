//! Dinic max-flow over a sparse graph with two terminals, used for s-t min-cuts.

use std::collections::VecDeque;

const NONE: usize = usize::MAX;
const UNVISITED: i64 = -1;

/// Flow network whose nodes are pixels plus a source and a sink
///
/// Edges are stored in pairs: edge `e` and its reverse `e ^ 1`.
pub struct FlowGraph {
    source: usize,
    sink: usize,
    head: Vec<usize>,
    next: Vec<usize>,
    to: Vec<usize>,
    capacity: Vec<f64>,
    level: Vec<i64>,
    cursor: Vec<usize>,
}

impl FlowGraph {
    /// Graph with `nodes` inner nodes; `edge_hint` pre-sizes the edge storage
    pub fn new(nodes: usize, edge_hint: usize) -> Self {
        let total = nodes + 2;
        Self {
            source: nodes,
            sink: nodes + 1,
            head: vec![NONE; total],
            next: Vec::with_capacity(edge_hint * 2),
            to: Vec::with_capacity(edge_hint * 2),
            capacity: Vec::with_capacity(edge_hint * 2),
            level: vec![UNVISITED; total],
            cursor: vec![NONE; total],
        }
    }

    fn push_arc(&mut self, from: usize, to: usize, capacity: f64) {
        self.to.push(to);
        self.capacity.push(capacity);
        self.next.push(self.head[from]);
        self.head[from] = self.to.len() - 1;
    }

    /// Undirected-style pair of arcs between two inner nodes
    pub fn add_edge(&mut self, a: usize, b: usize, forward: f64, backward: f64) {
        self.push_arc(a, b, forward);
        self.push_arc(b, a, backward);
    }

    /// Terminal links of `node`: capacity from the source and to the sink
    pub fn add_terminal_weights(&mut self, node: usize, from_source: f64, to_sink: f64) {
        // only the difference matters for the cut
        let shared = from_source.min(to_sink);
        let (from_source, to_sink) = (from_source - shared, to_sink - shared);
        if from_source > 0.0 {
            self.add_edge(self.source, node, from_source, 0.0);
        }
        if to_sink > 0.0 {
            self.add_edge(node, self.sink, to_sink, 0.0);
        }
    }

    fn build_levels(&mut self) -> bool {
        self.level.iter_mut().for_each(|l| *l = UNVISITED);
        self.level[self.source] = 0;
        let mut queue = VecDeque::from([self.source]);
        while let Some(u) = queue.pop_front() {
            let mut e = self.head[u];
            while e != NONE {
                let v = self.to[e];
                if self.capacity[e] > 0.0 && self.level[v] == UNVISITED {
                    self.level[v] = self.level[u] + 1;
                    queue.push_back(v);
                }
                e = self.next[e];
            }
        }
        self.level[self.sink] != UNVISITED
    }

    /// Push blocking flow along level-graph paths without recursion
    fn blocking_flow(&mut self) -> f64 {
        self.cursor.copy_from_slice(&self.head);
        let mut total = 0.0;
        let mut path: Vec<usize> = Vec::new();
        let mut u = self.source;

        loop {
            if u == self.sink {
                let (bottleneck_at, bottleneck) = path
                    .iter()
                    .enumerate()
                    .map(|(i, &e)| (i, self.capacity[e]))
                    .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best });
                for &e in &path {
                    self.capacity[e] -= bottleneck;
                    self.capacity[e ^ 1] += bottleneck;
                }
                total += bottleneck;
                // resume from the tail of the first saturated arc
                path.truncate(bottleneck_at);
                u = path.last().map_or(self.source, |&e| self.to[e]);
                continue;
            }

            let mut advanced = false;
            while self.cursor[u] != NONE {
                let e = self.cursor[u];
                let v = self.to[e];
                if self.capacity[e] > 0.0 && self.level[v] == self.level[u] + 1 {
                    path.push(e);
                    u = v;
                    advanced = true;
                    break;
                }
                self.cursor[u] = self.next[e];
            }
            if advanced {
                continue;
            }

            // dead end: retreat one arc and skip it
            let Some(e) = path.pop() else {
                break;
            };
            self.level[u] = UNVISITED;
            u = self.to[e ^ 1];
            self.cursor[u] = self.next[self.cursor[u]];
        }

        total
    }

    /// Saturate the network and return the max-flow value
    pub fn max_flow(&mut self) -> f64 {
        let mut flow = 0.0;
        while self.build_levels() {
            flow += self.blocking_flow();
        }
        flow
    }

    /// Nodes still reachable from the source in the residual graph, i.e. the source side of the cut
    pub fn source_side(&self) -> Vec<bool> {
        let mut reached = vec![false; self.head.len()];
        reached[self.source] = true;
        let mut queue = VecDeque::from([self.source]);
        while let Some(u) = queue.pop_front() {
            let mut e = self.head[u];
            while e != NONE {
                let v = self.to[e];
                if self.capacity[e] > 0.0 && !reached[v] {
                    reached[v] = true;
                    queue.push_back(v);
                }
                e = self.next[e];
            }
        }
        reached.truncate(self.source);
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn chain_flow_is_limited_by_the_weakest_link() {
        let mut graph = FlowGraph::new(3, 4);
        graph.add_terminal_weights(0, 10.0, 0.0);
        graph.add_edge(0, 1, 3.0, 0.0);
        graph.add_edge(1, 2, 7.0, 0.0);
        graph.add_terminal_weights(2, 0.0, 10.0);

        assert_relative_eq!(graph.max_flow(), 3.0);
        assert_eq!(graph.source_side(), vec![true, false, false]);
    }

    #[test]
    fn classic_network() {
        // CLRS flow network with source 0' and sink 5' mapped onto terminals
        let mut graph = FlowGraph::new(4, 10);
        graph.add_terminal_weights(0, 16.0, 0.0);
        graph.add_terminal_weights(1, 13.0, 0.0);
        graph.add_edge(0, 2, 12.0, 0.0);
        graph.add_edge(1, 0, 4.0, 0.0);
        graph.add_edge(2, 1, 9.0, 0.0);
        graph.add_edge(1, 3, 14.0, 0.0);
        graph.add_edge(3, 2, 7.0, 0.0);
        graph.add_terminal_weights(2, 0.0, 20.0);
        graph.add_terminal_weights(3, 0.0, 4.0);

        assert_relative_eq!(graph.max_flow(), 23.0);
    }

    #[test]
    fn terminal_weights_cancel() {
        let mut graph = FlowGraph::new(2, 4);
        graph.add_terminal_weights(0, 5.0, 2.0);
        graph.add_terminal_weights(1, 1.0, 4.0);
        graph.add_edge(0, 1, 1.0, 1.0);

        // node 0 keeps 3 toward the source, node 1 keeps 3 toward the sink
        assert_relative_eq!(graph.max_flow(), 1.0);
        assert_eq!(graph.source_side(), vec![true, false]);
    }
}
