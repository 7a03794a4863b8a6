//! Connected components.
//!
//! Undirected reachability partition shared by the topology analyzer and
//! the community detector.

/// Node partition into connected components.
#[derive(Debug, Clone, Default)]
pub struct ComponentPartition {
    /// Component id per node index
    pub component_of: Vec<usize>,
    /// Node indices per component, in ascending order.
    /// Components are numbered by their lowest node index.
    pub members: Vec<Vec<usize>>,
}

impl ComponentPartition {
    /// Number of components.
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// Size of the largest component (0 for an empty graph).
    pub fn largest_size(&self) -> usize {
        self.members.iter().map(|m| m.len()).max().unwrap_or(0)
    }
}

/// Partition nodes into connected components with a stack-based traversal.
pub fn connected_components(adj: &[Vec<usize>]) -> ComponentPartition {
    let n = adj.len();
    let mut component_of: Vec<Option<usize>> = vec![None; n];
    let mut members: Vec<Vec<usize>> = Vec::new();

    for start in 0..n {
        if component_of[start].is_some() {
            continue;
        }
        let id = members.len();
        let mut group = Vec::new();
        let mut stack = vec![start];
        component_of[start] = Some(id);

        while let Some(current) = stack.pop() {
            group.push(current);
            for &neighbor in &adj[current] {
                if component_of[neighbor].is_none() {
                    component_of[neighbor] = Some(id);
                    stack.push(neighbor);
                }
            }
        }
        group.sort_unstable();
        members.push(group);
    }

    ComponentPartition {
        component_of: component_of.into_iter().map(|c| c.unwrap_or(0)).collect(),
        members,
    }
}
