//! # Platform Port Topology
//!
//! Some machines wire a root hub port of a UHCI controller to an
//! ExpressCard slot. The platform describes its device tree (on PC
//! hardware: the ACPI namespace) and marks such a port as ejectable.
//! This module finds that port.
//!
//! The search walks the subtree below the controller's node depth-first
//! and stops at the first node that has no children and is ejectable.
//! Its location string is the 1-based port number.

use std::fmt::Debug;

use tracing::{debug, warn};

/// The deepest level below the controller node the search descends to.
pub const MAX_TOPOLOGY_DEPTH: usize = 32;

/// Read access to the platform's device topology.
pub trait PortTopologyQuery {
    /// A handle to one node of the topology.
    type Node: Copy + Debug;

    /// The node describing this controller, if the platform has one.
    fn controller_node(&self) -> Option<Self::Node>;

    /// The children of `node`, in platform order.
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    /// Whether `node` is a platform device that can be ejected.
    fn is_ejectable(&self, node: Self::Node) -> bool;

    /// The location string of `node`.
    fn location(&self, node: Self::Node) -> Option<&str>;

    /// The platform name of `node`, for diagnostics.
    fn name(&self, node: Self::Node) -> &str;
}

/// Find the root hub port wired to an ExpressCard slot.
///
/// Returns the 1-based port number, or 0 if there is none.
#[must_use]
pub fn express_card_port<Q: PortTopologyQuery>(topology: &Q) -> u32 {
    let Some(root) = topology.controller_node() else {
        debug!("controller has no platform topology node");
        return 0;
    };

    let mut stack: Vec<(Q::Node, usize)> = Vec::new();
    push_children(topology, &mut stack, root, 1);

    let mut warned_depth = false;
    while let Some((node, depth)) = stack.pop() {
        let children = topology.children(node);

        if children.is_empty() && topology.is_ejectable(node) {
            let port = topology.location(node).map_or(0, parse_location);
            debug!(
                "found ejectable port node {} at port {port}",
                topology.name(node)
            );
            return port;
        }

        if depth >= MAX_TOPOLOGY_DEPTH {
            if !children.is_empty() && !warned_depth {
                warn!("platform topology deeper than {MAX_TOPOLOGY_DEPTH} levels, not descending");
                warned_depth = true;
            }
            continue;
        }

        for child in children.into_iter().rev() {
            stack.push((child, depth + 1));
        }
    }

    0
}

fn push_children<Q: PortTopologyQuery>(
    topology: &Q,
    stack: &mut Vec<(Q::Node, usize)>,
    node: Q::Node,
    depth: usize,
) {
    // Reversed, so that the first child is popped first.
    for child in topology.children(node).into_iter().rev() {
        stack.push((child, depth));
    }
}

/// Parse a location string like `strtoul(s, NULL, 10)`.
///
/// Leading whitespace and a `+` sign are skipped, then decimal digits
/// are consumed up to the first non-digit. A string without digits
/// yields 0, values that don't fit saturate.
#[must_use]
pub fn parse_location(location: &str) -> u32 {
    let trimmed = location.trim_start();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);

    digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u32, |acc, d| {
            acc.saturating_mul(10).saturating_add(u32::from(d - b'0'))
        })
}

/// A handle to a node of a [`TopologyTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct TopologyNode {
    name: String,
    location: Option<String>,
    ejectable: bool,
    children: Vec<NodeId>,
}

/// An in-memory platform topology rooted at the controller's node.
#[derive(Debug, Clone)]
pub struct TopologyTree {
    nodes: Vec<TopologyNode>,
}

impl TopologyTree {
    /// Create a topology that only contains the controller node.
    #[must_use]
    pub fn new(controller_name: &str) -> Self {
        Self {
            nodes: vec![TopologyNode {
                name: controller_name.to_owned(),
                location: None,
                ejectable: false,
                children: Vec::new(),
            }],
        }
    }

    /// The controller node.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Add a node below `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not belong to this tree.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: &str,
        location: Option<&str>,
        ejectable: bool,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());

        self.nodes.push(TopologyNode {
            name: name.to_owned(),
            location: location.map(str::to_owned),
            ejectable,
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);

        id
    }
}

impl PortTopologyQuery for TopologyTree {
    type Node = NodeId;

    fn controller_node(&self) -> Option<NodeId> {
        Some(self.root())
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes[node.0].children.clone()
    }

    fn is_ejectable(&self, node: NodeId) -> bool {
        self.nodes[node.0].ejectable
    }

    fn location(&self, node: NodeId) -> Option<&str> {
        self.nodes[node.0].location.as_deref()
    }

    fn name(&self, node: NodeId) -> &str {
        &self.nodes[node.0].name
    }
}

/// A platform that has no topology information for the controller.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTopology {}

impl PortTopologyQuery for NoTopology {
    type Node = ();

    fn controller_node(&self) -> Option<()> {
        None
    }

    fn children(&self, _node: ()) -> Vec<()> {
        Vec::new()
    }

    fn is_ejectable(&self, _node: ()) -> bool {
        false
    }

    fn location(&self, _node: ()) -> Option<&str> {
        None
    }

    fn name(&self, _node: ()) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A controller with a root hub node and two port nodes.
    fn root_hub(port2_ejectable: bool) -> TopologyTree {
        let mut tree = TopologyTree::new("UHC1");
        let hub = tree.add_child(tree.root(), "RHUB", None, false);
        tree.add_child(hub, "PRT1", Some("1"), false);
        tree.add_child(hub, "PRT2", Some("2"), port2_ejectable);
        tree
    }

    #[test]
    fn finds_ejectable_leaf() {
        let mut tree = TopologyTree::new("UHC1");
        let hub = tree.add_child(tree.root(), "RHUB", None, false);
        tree.add_child(hub, "PRT1", Some("1"), false);
        tree.add_child(hub, "PRT3", Some("3"), true);

        assert_eq!(express_card_port(&tree), 3);
    }

    #[test]
    fn no_ejectable_leaf_means_no_port() {
        assert_eq!(express_card_port(&root_hub(false)), 0);
    }

    #[test]
    fn missing_controller_node_means_no_port() {
        assert_eq!(express_card_port(&NoTopology::default()), 0);
    }

    #[test]
    fn ejectable_inner_nodes_are_ignored() {
        let mut tree = TopologyTree::new("UHC1");
        let hub = tree.add_child(tree.root(), "RHUB", Some("7"), true);
        tree.add_child(hub, "PRT1", Some("1"), false);

        assert_eq!(express_card_port(&tree), 0);
    }

    #[test]
    fn first_match_in_depth_first_order_wins() {
        let mut tree = TopologyTree::new("UHC1");
        let hub = tree.add_child(tree.root(), "RHUB", None, false);
        let deep = tree.add_child(hub, "HUB2", None, false);
        tree.add_child(deep, "PRT2", Some("2"), true);
        tree.add_child(hub, "PRT1", Some("1"), true);

        assert_eq!(
            express_card_port(&tree),
            2,
            "the subtree of the first child is searched before its siblings"
        );
    }

    #[test]
    fn search_is_bounded_in_depth() {
        let mut tree = TopologyTree::new("UHC1");
        let mut node = tree.root();
        for level in 0..MAX_TOPOLOGY_DEPTH + 4 {
            node = tree.add_child(node, &format!("N{level}"), None, false);
        }
        tree.add_child(node, "PRT1", Some("1"), true);

        assert_eq!(express_card_port(&tree), 0);
    }

    #[test]
    fn leaf_at_maximum_depth_is_found() {
        let mut tree = TopologyTree::new("UHC1");
        let mut node = tree.root();
        for level in 0..MAX_TOPOLOGY_DEPTH - 1 {
            node = tree.add_child(node, &format!("N{level}"), None, false);
        }
        tree.add_child(node, "PRT2", Some("2"), true);

        assert_eq!(express_card_port(&tree), 2);
    }

    #[test]
    fn location_parsing_follows_strtoul() {
        assert_eq!(parse_location("3"), 3);
        assert_eq!(parse_location("  12abc"), 12);
        assert_eq!(parse_location("+4"), 4);
        assert_eq!(parse_location("abc"), 0);
        assert_eq!(parse_location(""), 0);
        assert_eq!(parse_location("99999999999"), u32::MAX);
    }

    #[test]
    fn nodes_report_their_platform_names() {
        let tree = root_hub(true);
        let hub = tree.children(tree.root())[0];
        let ports: Vec<&str> = tree
            .children(hub)
            .into_iter()
            .map(|port| tree.name(port))
            .collect();

        assert_eq!(tree.name(tree.root()), "UHC1");
        assert_eq!(tree.name(hub), "RHUB");
        assert_eq!(ports, ["PRT1", "PRT2"]);
    }
}
