//! Track dependency graph validation
//!
//! The validator only sees the graph through an edge-lookup callback, so it
//! works the same against SQLite, a speculative overlay, or a plain map in
//! tests.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// Fails with [`Error::CycleDetected`] if any path from `start` returns to a
/// node that is still on the active DFS path.
///
/// Nodes reachable along several paths (diamonds) are explored once and are
/// not reported. `edges(id)` returns the outgoing dependency edges of `id`.
pub fn validate_no_cycles<F>(start: &str, mut edges: F) -> Result<()>
where
    F: FnMut(&str) -> Result<Vec<String>>,
{
    // Each frame holds a node and the edges still to walk from it
    let mut stack: Vec<(String, std::vec::IntoIter<String>)> = Vec::new();
    let mut on_path: HashSet<String> = HashSet::new();
    let mut finished: HashSet<String> = HashSet::new();

    on_path.insert(start.to_string());
    stack.push((start.to_string(), edges(start)?.into_iter()));

    while let Some((_, pending)) = stack.last_mut() {
        match pending.next() {
            Some(next) => {
                if on_path.contains(&next) {
                    let mut path: Vec<String> = stack
                        .iter()
                        .map(|(node, _)| node.clone())
                        .skip_while(|node| *node != next)
                        .collect();
                    path.push(next);
                    return Err(Error::CycleDetected { path });
                }
                if finished.contains(&next) {
                    continue;
                }
                let outgoing = edges(&next)?;
                on_path.insert(next.clone());
                stack.push((next, outgoing.into_iter()));
            }
            None => {
                if let Some((node, _)) = stack.pop() {
                    on_path.remove(&node);
                    finished.insert(node);
                }
            }
        }
    }

    Ok(())
}

/// Checks a candidate edge `track_id -> depends_on_id` against the existing
/// graph without writing it.
///
/// A self edge is rejected before any traversal. Otherwise the candidate is
/// overlaid on the edges returned by `edges` and the graph is walked from
/// `track_id`.
pub fn validate_new_edge<F>(track_id: &str, depends_on_id: &str, mut edges: F) -> Result<()>
where
    F: FnMut(&str) -> Result<Vec<String>>,
{
    if track_id == depends_on_id {
        return Err(Error::SelfDependency {
            track_id: track_id.to_string(),
        });
    }

    validate_no_cycles(track_id, |id| {
        let mut out = edges(id)?;
        if id == track_id && !out.iter().any(|d| d == depends_on_id) {
            out.push(depends_on_id.to_string());
        }
        Ok(out)
    })
}
