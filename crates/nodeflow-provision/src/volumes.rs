//! Volume naming and ownership
//!
//! Volumes belong to a node purely by name: `<node>_<index>`. Nothing is
//! tracked, so cleanup works from the node name alone, even after a crash.

use nodeflow_cloud::Volume;

/// Names for `count` volumes of `node_name`, zero-padded to the width of
/// the largest index
pub fn volume_names(node_name: &str, count: u32) -> Vec<String> {
    if count == 0 {
        return Vec::new();
    }
    let width = (count - 1).to_string().len();
    (0..count)
        .map(|i| format!("{}_{:0width$}", node_name, i, width = width))
        .collect()
}

/// Volumes owned by `node_name`
pub fn owned_volumes<'a>(volumes: &'a [Volume], node_name: &str) -> Vec<&'a Volume> {
    let prefix = format!("{}_", node_name);
    volumes.iter().filter(|v| v.name.starts_with(&prefix)).collect()
}
