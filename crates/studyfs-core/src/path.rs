//! Path resolution, decoupled from presentation.
//!
//! A path is computed by walking parents bottom-up until a stop predicate
//! holds, then handing the accumulated segments to a formatting function.
//! The two trees plug in different predicates and formatters: filesystem
//! paths render as `fsName:seg1/seg2`, project paths as `seg1/seg2` with the
//! project's own name skipped.

use crate::error::AfsError;

/// A node the path walker can traverse: it has a name and a resolvable
/// parent.
pub trait PathNode: Sized {
    fn node_name(&self) -> &str;
    fn path_parent(&self) -> Result<Option<Self>, AfsError>;
}

/// Segments of a node's path, root-most first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// Walks parents from `node` upward, accumulating names until `stop`
    /// holds for the current node (the stopped-at node contributes no
    /// segment), then reverses into root-first order.
    pub fn find<N, S>(node: &N, stop: S) -> Result<Self, AfsError>
    where
        N: PathNode + Clone,
        S: Fn(&N) -> bool,
    {
        let mut segments = Vec::new();
        let mut current = node.clone();
        while !stop(&current) {
            segments.push(current.node_name().to_string());
            match current.path_parent()? {
                Some(parent) => current = parent,
                None => break,
            }
        }
        segments.reverse();
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn format<F>(&self, formatter: F) -> String
    where
        F: FnOnce(&[String]) -> String,
    {
        formatter(&self.segments)
    }
}

/// `fsName:seg1/seg2`
pub fn format_fs_path(fs_name: &str, segments: &[String]) -> String {
    format!("{}:{}", fs_name, segments.join("/"))
}

/// `seg1/seg2`
pub fn format_project_path(segments: &[String]) -> String {
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Seg {
        chain: Vec<&'static str>,
    }

    impl PathNode for Seg {
        fn node_name(&self) -> &str {
            self.chain.last().unwrap()
        }

        fn path_parent(&self) -> Result<Option<Self>, AfsError> {
            if self.chain.len() <= 1 {
                return Ok(None);
            }
            Ok(Some(Seg {
                chain: self.chain[..self.chain.len() - 1].to_vec(),
            }))
        }
    }

    #[test]
    fn walk_stops_before_pushing_stop_node() {
        let node = Seg {
            chain: vec!["root", "a", "b"],
        };
        let path = NodePath::find(&node, |n| n.chain.len() == 1).unwrap();
        assert_eq!(path.segments(), ["a", "b"]);
        assert_eq!(path.format(|segs| format_fs_path("fs", segs)), "fs:a/b");
    }

    #[test]
    fn stop_at_start_yields_empty_path() {
        let node = Seg { chain: vec!["root"] };
        let path = NodePath::find(&node, |n| n.chain.len() == 1).unwrap();
        assert!(path.segments().is_empty());
        assert_eq!(path.format(format_project_path), "");
    }
}
