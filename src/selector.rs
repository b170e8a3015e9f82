use crate::errors::BenchError;

/// Filters the cluster's node inventory down to an allow-list.
///
/// The allow-list is a comma separated list of node names. An empty (or
/// missing) allow-list selects the whole inventory. Inventory order is
/// preserved; allow-list entries that match nothing are silently dropped.
pub fn select_nodes(inventory: &[String], allow_list: Option<&str>) -> Vec<String> {
    let allowed: Vec<&str> = allow_list
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    if allowed.is_empty() {
        return inventory.to_vec();
    }

    inventory
        .iter()
        .filter(|node| allowed.contains(&node.as_str()))
        .cloned()
        .collect()
}

/// Checks that a selection is large enough for the benchmark about to run.
/// Callers invoke this before any cluster mutation.
pub fn require_nodes(nodes: &[String], required: usize) -> anyhow::Result<()> {
    if nodes.is_empty() {
        return Err(BenchError::EmptySelection.into());
    }
    if nodes.len() < required {
        return Err(BenchError::InsufficientNodes {
            required,
            available: nodes.len(),
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory() -> Vec<String> {
        vec!["n1".to_string(), "n2".to_string(), "n3".to_string()]
    }

    #[test]
    fn empty_allow_list_selects_everything() {
        assert_eq!(select_nodes(&inventory(), None), inventory());
        assert_eq!(select_nodes(&inventory(), Some("")), inventory());
    }

    #[test]
    fn selection_preserves_inventory_order() {
        let selected = select_nodes(&inventory(), Some("n3,n1"));
        assert_eq!(selected, vec!["n1".to_string(), "n3".to_string()]);
    }

    #[test]
    fn unknown_names_are_dropped() {
        let selected = select_nodes(&inventory(), Some("n2,bogus"));
        assert_eq!(selected, vec!["n2".to_string()]);
    }

    #[test]
    fn whitespace_around_entries_is_ignored() {
        let selected = select_nodes(&inventory(), Some(" n1 , n2 "));
        assert_eq!(selected, vec!["n1".to_string(), "n2".to_string()]);
    }

    #[test]
    fn empty_selection_is_an_error() {
        let selected = select_nodes(&inventory(), Some("bogus"));
        let err = require_nodes(&selected, 1).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn two_node_requirement_is_enforced() {
        let selected = select_nodes(&inventory(), Some("n1"));
        let err = require_nodes(&selected, 2).unwrap_err();
        assert!(err.to_string().contains("at least 2"));
    }
}
