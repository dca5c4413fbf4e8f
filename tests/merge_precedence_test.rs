/// Precedence merge properties over scanned trees
#[cfg(test)]
mod merge_tests {
    use imagepin::constants::LEAF_FILE_NAME;
    use imagepin::tree::merge::{merge_ordered, RefTree};
    use imagepin::tree::scanner::{scan_tree, PIN_SCHEMA};
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_pin(root: &Path, rel: &str, reference: &str) {
        let dir = root.join(rel);
        fs::create_dir_all(&dir).expect("Failed to create pin dir");
        fs::write(dir.join(LEAF_FILE_NAME), format!("FROM {}\n", reference))
            .expect("Failed to write pin");
    }

    fn scanned(root: &Path) -> RefTree {
        scan_tree(root, &PIN_SCHEMA).to_ref_tree(|r| Some(r.directive.reference.clone()))
    }

    #[test]
    fn test_last_tree_wins_for_every_ordering() {
        let dir = tempdir().expect("Failed to create temp dir");
        let names = ["a", "b", "c"];
        for name in names {
            write_pin(
                &dir.path().join(name),
                "nginx/1.24/linux/amd64",
                &format!("docker.io/library/nginx:1.24-{}", name),
            );
        }
        // a key only the first tree defines
        write_pin(&dir.path().join("a"), "nginx/1.20", "docker.io/library/nginx:1.20");

        let orderings = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orderings {
            let trees: Vec<RefTree> = order
                .iter()
                .map(|&i| scanned(&dir.path().join(names[i])))
                .collect();
            let merged = merge_ordered(trees);
            let winner = names[order[2]];
            assert_eq!(
                merged.leaf(&["nginx", "1.24", "linux/amd64"]),
                Some(format!("docker.io/library/nginx:1.24-{}", winner).as_str()),
                "ordering {:?}",
                order
            );
            assert_eq!(
                merged.leaf(&["nginx", "1.20"]),
                Some("docker.io/library/nginx:1.20")
            );
        }
    }

    #[test]
    fn test_merge_is_independent_of_creation_order() {
        let first = tempdir().expect("Failed to create temp dir");
        let second = tempdir().expect("Failed to create temp dir");

        write_pin(first.path(), "redis/7.2", "docker.io/library/redis:7.2");
        write_pin(first.path(), "alpine/3.19", "docker.io/library/alpine:3.19");
        write_pin(second.path(), "alpine/3.19", "docker.io/library/alpine:3.19");
        write_pin(second.path(), "redis/7.2", "docker.io/library/redis:7.2");

        let a = serde_json::to_string(&merge_ordered(vec![scanned(first.path())])).unwrap();
        let b = serde_json::to_string(&merge_ordered(vec![scanned(second.path())])).unwrap();
        assert_eq!(a, b);
    }
}
