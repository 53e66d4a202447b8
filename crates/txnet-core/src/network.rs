use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::address::normalize;
use crate::error::CoreError;
use crate::resolver::TransactionResolver;
use crate::types::{
    NetworkGraph, NetworkLink, NetworkNode, NetworkRequest, NodeKind, RecordKey, TransactionRecord,
};

/// Deepest expansion a single request may ask for.
pub const MAX_DEPTH: u32 = 3;

// ==============================================================================
// Network Expansion
// ==============================================================================

/// Build the transaction network around `request.root_address` by
/// breadth-first expansion over counterpart addresses.
///
/// Level `n` resolves every address discovered at level `n - 1`; addresses
/// first seen at the last level become nodes but are not resolved. Every
/// resolve call uses the requested depth as its freshness threshold.
///
/// An invalid discovered address is logged and skipped. An invalid root, or
/// any data source or store failure, aborts the expansion.
pub async fn expand(
    resolver: &TransactionResolver,
    request: &NetworkRequest,
) -> Result<NetworkGraph, CoreError> {
    let depth = request.depth;
    if !(1..=MAX_DEPTH).contains(&depth) {
        return Err(CoreError::InvalidDepth {
            depth,
            max: MAX_DEPTH,
        });
    }

    let root_id = normalize(&request.root_address);
    let mut graph = GraphBuilder::default();
    graph.add_node(&root_id, &request.root_address, NodeKind::Source);

    // (node id, label to resolve with). Ids are case-folded; labels keep
    // the on-chain casing that base58 checks need.
    let mut frontier: Vec<(String, String)> = vec![(root_id.clone(), request.root_address.clone())];

    for level in 0..depth {
        if frontier.is_empty() {
            debug!(level, "frontier exhausted");
            break;
        }
        let next_level = level + 1;
        let mut next: Vec<(String, String)> = Vec::new();

        for (id, label) in &frontier {
            let records = match resolver
                .resolve(request.blockchain, label, &request.window, depth)
                .await
            {
                Ok(records) => records,
                Err(CoreError::InvalidAddress { address, .. }) if *id != root_id => {
                    warn!(%address, level, "skipping invalid counterpart address");
                    continue;
                }
                Err(e) => return Err(e),
            };

            for record in records {
                if request.min_amount.is_some_and(|min| record.value < min) {
                    continue;
                }

                let from_id = normalize(&record.from_address);
                let to_id = normalize(&record.to_address);
                for (endpoint_id, endpoint_label) in
                    [(&from_id, &record.from_address), (&to_id, &record.to_address)]
                {
                    let is_new = graph.add_node(endpoint_id, endpoint_label, NodeKind::Address);
                    if is_new && next_level < depth {
                        next.push((endpoint_id.clone(), endpoint_label.clone()));
                    }
                }
                graph.add_link(&record, from_id, to_id);
            }
        }

        debug!(level, discovered = next.len(), "level expanded");
        frontier = next;
    }

    let mut network = graph.finish();

    if let Some(focus) = &request.focus_address {
        network = collapse_to_focus(network, &root_id, focus);
    }

    info!(
        blockchain = %request.blockchain,
        root = %request.root_address,
        depth,
        nodes = network.nodes.len(),
        links = network.links.len(),
        "network expanded"
    );
    Ok(network)
}

/// Reduce `network` to the root, the focus address, and the links directly
/// between them in either direction.
fn collapse_to_focus(network: NetworkGraph, root_id: &str, focus: &str) -> NetworkGraph {
    let focus_id = normalize(focus);

    let mut nodes: Vec<NetworkNode> = network
        .nodes
        .into_iter()
        .filter(|n| n.id == root_id || n.id == focus_id)
        .collect();
    match nodes.iter_mut().find(|n| n.id == focus_id) {
        Some(node) => node.kind = NodeKind::Focus,
        None => nodes.push(NetworkNode {
            id: focus_id.clone(),
            label: focus.to_owned(),
            kind: NodeKind::Focus,
        }),
    }

    let links = network
        .links
        .into_iter()
        .filter(|l| {
            (l.source == root_id && l.target == focus_id)
                || (l.source == focus_id && l.target == root_id)
        })
        .collect();

    NetworkGraph { nodes, links }
}

// ==============================================================================
// Graph Accumulator
// ==============================================================================

/// Insertion-ordered node and link accumulator.
///
/// Nodes are unique by id. Links are unique by their record identity with
/// case-folded endpoints, so a transfer seen from both of its endpoints is
/// linked once while separate outputs of one UTXO transaction each keep a
/// link.
#[derive(Default)]
struct GraphBuilder {
    nodes: Vec<NetworkNode>,
    node_index: HashMap<String, usize>,
    links: Vec<NetworkLink>,
    seen_links: HashSet<RecordKey>,
}

impl GraphBuilder {
    /// Add a node unless one with `id` exists. Returns whether it was new.
    fn add_node(&mut self, id: &str, label: &str, kind: NodeKind) -> bool {
        if self.node_index.contains_key(id) {
            return false;
        }
        self.node_index.insert(id.to_owned(), self.nodes.len());
        self.nodes.push(NetworkNode {
            id: id.to_owned(),
            label: label.to_owned(),
            kind,
        });
        true
    }

    fn add_link(&mut self, record: &TransactionRecord, source: String, target: String) {
        let key = RecordKey {
            txid: record.txid.clone(),
            value_bits: record.value.to_bits(),
            from_address: source.clone(),
            to_address: target.clone(),
        };
        if !self.seen_links.insert(key) {
            return;
        }
        self.links.push(NetworkLink {
            id: format!("{source}_{target}_{}", record.txid),
            source,
            target,
            value: record.value,
            timestamp: record.timestamp,
        });
    }

    fn finish(self) -> NetworkGraph {
        NetworkGraph {
            nodes: self.nodes,
            links: self.links,
        }
    }
}
