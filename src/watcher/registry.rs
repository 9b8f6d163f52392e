//! Registry of watched directories and the symlinks that reach them.
//!
//! Every real directory under watch is one [`WatchedResource`], keyed by its
//! canonical path and carrying the watch handle plus the set of symlinks that
//! resolve to it. Directories outside the root are only watched while the root
//! still reaches them through some chain of symlinks;
//! [`Registry::remove_symlink_cascading`] restores that after a symlink
//! disappears.

use indexmap::IndexMap;

use super::WatchError;
use super::event::EventMask;
use super::source::WatchSource;
use crate::paths::is_prefix_of;
use crate::queue::{NodeRef, Queue};

/// Stable key of a registered resource.
pub type EntryId = NodeRef;

/// A symlink that has been traversed into a watched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkRef {
    /// Path of the link itself, not its target.
    pub path: String,
    /// The resource the link resolves to.
    pub target: EntryId,
}

/// A watched real directory.
#[derive(Debug)]
pub struct WatchedResource<H> {
    handle: H,
    path: String,
    symlinks: IndexMap<String, SymlinkRef>,
}

impl<H> WatchedResource<H> {
    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn symlinks(&self) -> impl Iterator<Item = &SymlinkRef> {
        self.symlinks.values()
    }

    pub fn symlink_count(&self) -> usize {
        self.symlinks.len()
    }

    pub fn has_symlink(&self, symlink_path: &str) -> bool {
        self.symlinks.contains_key(symlink_path)
    }
}

/// All watched directories of one monitored tree.
pub struct Registry<S: WatchSource> {
    source: S,
    mask: EventMask,
    root_path: String,
    entries: Queue<WatchedResource<S::Handle>>,
}

impl<S: WatchSource> Registry<S> {
    /// Create an empty registry for the tree at `root_path` (canonical,
    /// slash-terminated). Nothing is watched until [`Registry::add`].
    pub fn new(source: S, root_path: impl Into<String>, mask: EventMask) -> Self {
        Self {
            source,
            mask,
            root_path: root_path.into(),
            entries: Queue::new(),
        }
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    pub fn mask(&self) -> EventMask {
        self.mask
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Number of watched directories.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &WatchedResource<S::Handle>)> {
        self.entries.iter()
    }

    /// Watched paths in registration order.
    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|(_, r)| r.path.as_str()).collect()
    }

    pub fn resource(&self, id: EntryId) -> Option<&WatchedResource<S::Handle>> {
        self.entries.get(id)
    }

    /// Watch `path`, optionally recording `symlink` as a link reaching it.
    ///
    /// Adding an already watched path returns its existing entry; adding a
    /// symlink twice records it once. When the source refuses the watch
    /// nothing changes and [`WatchError::WatchFailed`] is returned.
    pub fn add(&mut self, path: &str, symlink: Option<&str>) -> Result<EntryId, WatchError> {
        let id = match self.find_by_path(path) {
            Some(id) => id,
            None => {
                let handle =
                    self.source
                        .add_watch(path, self.mask)
                        .map_err(|e| WatchError::WatchFailed {
                            path: path.to_string(),
                            reason: e.to_string(),
                        })?;

                crate::log_event!("registry", "watching", "{handle:?} {path}");
                self.entries.enqueue(WatchedResource {
                    handle,
                    path: path.to_string(),
                    symlinks: IndexMap::new(),
                })
            }
        };

        if let Some(link) = symlink {
            if let Some(resource) = self.entries.get_mut(id) {
                if !resource.symlinks.contains_key(link) {
                    resource.symlinks.insert(
                        link.to_string(),
                        SymlinkRef {
                            path: link.to_string(),
                            target: id,
                        },
                    );
                    crate::log_event!("registry", "symlink added", "{link} -> {path}");
                }
            }
        }

        Ok(id)
    }

    pub fn find_by_path(&self, path: &str) -> Option<EntryId> {
        self.entries
            .iter()
            .find(|(_, r)| r.path == path)
            .map(|(id, _)| id)
    }

    pub fn find_by_handle(&self, handle: &S::Handle) -> Option<EntryId> {
        self.entries
            .iter()
            .find(|(_, r)| r.handle == *handle)
            .map(|(id, _)| id)
    }

    pub fn find_symlink(&self, symlink_path: &str) -> Option<&SymlinkRef> {
        self.entries
            .iter()
            .find_map(|(_, r)| r.symlinks.get(symlink_path))
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.find_by_path(path).is_some()
    }

    /// Stop watching the directory at `path` and forget the symlinks that
    /// reached it. Returns `false` when it was not registered.
    pub fn remove_resource(&mut self, path: &str) -> bool {
        match self.find_by_path(path) {
            Some(id) => self.unwatch(id),
            None => false,
        }
    }

    /// Drop the directory at `dir_path` together with everything registered
    /// below it, then unwind the symlinks that lived inside it.
    ///
    /// Used when a directory is deleted or moved away: its descendants are
    /// gone with it, and links inside it no longer reach anything. The root
    /// itself stays registered. Returns the number of resources unwatched.
    pub fn remove_subtree(&mut self, dir_path: &str) -> usize {
        let doomed: Vec<EntryId> = self
            .entries
            .iter()
            .filter(|(_, r)| is_prefix_of(dir_path, &r.path) && r.path != self.root_path)
            .map(|(id, _)| id)
            .collect();
        let removed = doomed.into_iter().filter(|id| self.unwatch(*id)).count();

        let inner_links: Vec<String> = self
            .entries
            .iter()
            .flat_map(|(_, r)| r.symlinks.keys())
            .filter(|link| is_prefix_of(dir_path, link))
            .cloned()
            .collect();
        for link in &inner_links {
            self.detach_symlink(link);
        }

        removed + self.sweep_unreachable()
    }

    /// Forget the symlink at `symlink_path` and unwatch whatever only it kept
    /// reachable.
    ///
    /// A resource stays watched while it lies under the root, lies under a
    /// resource that stays watched, or has a symlink located in one of those
    /// places. Everything else is unwatched, and the links that lived in the
    /// unwatched directories are forgotten with them. Returns the number of
    /// resources unwatched.
    pub fn remove_symlink_cascading(&mut self, symlink_path: &str) -> usize {
        if !self.detach_symlink(symlink_path) {
            return 0;
        }
        self.sweep_unreachable()
    }

    /// Remove every watch, best effort. Used on shutdown.
    pub fn release_all(&mut self) {
        while let Some(resource) = self.entries.dequeue() {
            if let Err(e) = self.source.remove_watch(&resource.handle) {
                crate::debug_event!("registry", "release failed", "{}: {e}", resource.path);
            }
        }
    }

    /// Whether `candidate_child` is `candidate_parent` or lies below it.
    pub fn is_child_of(candidate_parent: &str, candidate_child: &str) -> bool {
        is_prefix_of(candidate_parent, candidate_child)
    }

    /// Whether either path is an ancestor of (or equal to) the other.
    pub fn is_related_to(a: &str, b: &str) -> bool {
        is_prefix_of(a, b) || is_prefix_of(b, a)
    }

    fn is_in_tree(&self, path: &str) -> bool {
        is_prefix_of(&self.root_path, path)
    }

    fn detach_symlink(&mut self, link: &str) -> bool {
        let Some(owner) = self.find_symlink(link).map(|s| s.target) else {
            return false;
        };
        let Some(resource) = self.entries.get_mut(owner) else {
            return false;
        };

        resource.symlinks.shift_remove(link);
        crate::log_event!("registry", "symlink removed", "{link} -> {}", resource.path);
        true
    }

    /// Whether something at `location` can be reached from the root, given
    /// the resource paths already known to be reachable.
    fn reaches(&self, reachable: &[String], location: &str) -> bool {
        self.is_in_tree(location) || reachable.iter().any(|p| is_prefix_of(p, location))
    }

    /// Paths of every resource reachable from the root, grown until stable.
    fn reachable_paths(&self) -> Vec<String> {
        let mut reachable: Vec<String> = Vec::new();
        loop {
            let known = reachable.len();
            for (_, r) in self.entries.iter() {
                if reachable.contains(&r.path) {
                    continue;
                }
                if self.reaches(&reachable, &r.path)
                    || r.symlinks.keys().any(|link| self.reaches(&reachable, link))
                {
                    reachable.push(r.path.clone());
                }
            }
            if reachable.len() == known {
                return reachable;
            }
        }
    }

    /// Unwatch every resource the root no longer reaches and forget the links
    /// located inside them.
    fn sweep_unreachable(&mut self) -> usize {
        let reachable = self.reachable_paths();
        let doomed: Vec<(EntryId, String)> = self
            .entries
            .iter()
            .filter(|(_, r)| !reachable.contains(&r.path))
            .map(|(id, r)| (id, r.path.clone()))
            .collect();
        if doomed.is_empty() {
            return 0;
        }

        let stale_links: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, r)| reachable.contains(&r.path))
            .flat_map(|(_, r)| r.symlinks.keys())
            .filter(|link| {
                doomed.iter().any(|(_, path)| is_prefix_of(path, link))
                    && !self.reaches(&reachable, link)
            })
            .cloned()
            .collect();
        for link in &stale_links {
            self.detach_symlink(link);
        }

        doomed
            .into_iter()
            .filter(|(id, _)| self.unwatch(*id))
            .count()
    }

    fn unwatch(&mut self, id: EntryId) -> bool {
        let Some(resource) = self.entries.remove(id) else {
            return false;
        };

        // The kernel drops the watch of a deleted directory on its own
        if let Err(e) = self.source.remove_watch(&resource.handle) {
            crate::debug_event!("registry", "watch already gone", "{}: {e}", resource.path);
        }
        crate::log_event!(
            "registry",
            "unwatching",
            "{:?} {}",
            resource.handle,
            resource.path
        );
        true
    }
}

impl<S: WatchSource + std::fmt::Debug> std::fmt::Debug for Registry<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("root_path", &self.root_path)
            .field("mask", &self.mask)
            .field("entries", &self.entries.len())
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::ScriptedSource;

    fn registry() -> Registry<ScriptedSource> {
        registry_at("/root/")
    }

    fn registry_at(root: &str) -> Registry<ScriptedSource> {
        Registry::new(ScriptedSource::new(), root, EventMask::DEFAULT)
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut registry = registry();

        let first = registry.add("/root/", None).unwrap();
        let second = registry.add("/root/", None).unwrap();

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.source().live_count(), 1);
    }

    #[test]
    fn test_symlink_accumulation() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();

        let id = registry.add("/ext/", Some("/root/l1")).unwrap();
        registry.add("/ext/", Some("/root/l2")).unwrap();
        registry.add("/ext/", Some("/root/l2")).unwrap();

        let resource = registry.resource(id).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(resource.symlink_count(), 2);
        assert!(resource.has_symlink("/root/l1"));
        assert_eq!(registry.find_symlink("/root/l2").unwrap().target, id);
    }

    #[test]
    fn test_failed_add_changes_nothing() {
        let mut registry = registry();
        registry.source_mut().refuse("/root/full/");

        let err = registry.add("/root/full/", Some("/root/link")).unwrap_err();

        assert!(matches!(err, WatchError::WatchFailed { ref path, .. } if path == "/root/full/"));
        assert!(registry.is_empty());
        assert!(registry.find_symlink("/root/link").is_none());
    }

    #[test]
    fn test_find_by_handle() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();
        let id = registry.add("/root/a/", None).unwrap();

        let handle = *registry.resource(id).unwrap().handle();
        assert_eq!(registry.find_by_handle(&handle), Some(id));
        assert_eq!(registry.find_by_handle(&999), None);
    }

    #[test]
    fn test_remove_resource_is_idempotent() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();
        registry.add("/root/a/", None).unwrap();

        assert!(registry.remove_resource("/root/a/"));
        assert!(!registry.remove_resource("/root/a/"));
        assert!(!registry.remove_resource("/never/"));
        assert_eq!(registry.paths(), vec!["/root/"]);
        assert!(!registry.source().is_watching("/root/a/"));
    }

    #[test]
    fn test_cascading_removal_of_unknown_link_is_noop() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();

        assert_eq!(registry.remove_symlink_cascading("/root/plain-file"), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_orphan_sweep() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();
        registry.add("/root/a/", None).unwrap();
        registry.add("/ext/pointed/", Some("/root/link")).unwrap();
        registry.add("/ext/pointed/sub/", None).unwrap();

        let removed = registry.remove_symlink_cascading("/root/link");

        assert_eq!(removed, 2);
        assert_eq!(registry.paths(), vec!["/root/", "/root/a/"]);
        assert_eq!(registry.source().live_count(), 2);
    }

    #[test]
    fn test_protected_island_survives_sweep() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();
        registry.add("/ext/", Some("/root/link")).unwrap();
        registry.add("/ext/a/", None).unwrap();
        registry.add("/ext/b/", Some("/root/other")).unwrap();
        registry.add("/ext/b/c/", None).unwrap();

        registry.remove_symlink_cascading("/root/link");

        assert_eq!(registry.paths(), vec!["/root/", "/ext/b/", "/ext/b/c/"]);
    }

    #[test]
    fn test_still_reachable_through_ancestor() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();
        registry.add("/ext/", Some("/root/top")).unwrap();
        registry.add("/ext/inner/", Some("/root/inner")).unwrap();

        assert_eq!(registry.remove_symlink_cascading("/root/inner"), 0);
        assert!(registry.contains_path("/ext/inner/"));
    }

    #[test]
    fn test_in_tree_resources_are_never_swept() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();
        registry.add("/root/a/", Some("/ext/link-into-tree")).unwrap();
        // The root's parent reached through a link pointing upwards
        registry.add("/", Some("/root/up")).unwrap();

        registry.remove_symlink_cascading("/ext/link-into-tree");
        registry.remove_symlink_cascading("/root/up");

        assert_eq!(registry.paths(), vec!["/root/", "/root/a/"]);
    }

    #[test]
    fn test_link_to_root_ancestor_keeps_other_external_dirs() {
        let mut registry = registry_at("/top/root/");
        registry.add("/top/root/", None).unwrap();
        registry.add("/ext/", Some("/top/root/link")).unwrap();
        registry.add("/top/", Some("/top/root/up")).unwrap();

        let removed = registry.remove_symlink_cascading("/top/root/up");

        assert_eq!(removed, 1);
        assert_eq!(registry.paths(), vec!["/top/root/", "/ext/"]);
        assert!(registry.find_symlink("/top/root/link").is_some());
    }

    #[test]
    fn test_sibling_of_root_stays_watched() {
        let mut registry = registry_at("/a/root/");
        registry.add("/a/root/", None).unwrap();
        registry.add("/a/other/", Some("/a/root/l")).unwrap();
        registry.add("/a/", Some("/a/root/up")).unwrap();

        registry.remove_symlink_cascading("/a/root/up");

        assert_eq!(registry.paths(), vec!["/a/root/", "/a/other/"]);
        assert!(registry.source().is_watching("/a/other/"));
        assert!(!registry.source().is_watching("/a/"));
    }

    #[test]
    fn test_reached_back_through_watched_subdirectory() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();
        registry.add("/ext/", Some("/root/l")).unwrap();
        registry.add("/ext/sub/", Some("/root/s")).unwrap();
        registry.add("/ext/", Some("/ext/sub/back")).unwrap();

        assert_eq!(registry.remove_symlink_cascading("/root/l"), 0);
        assert_eq!(registry.paths(), vec!["/root/", "/ext/", "/ext/sub/"]);
        assert!(registry.find_symlink("/ext/sub/back").is_some());

        // Without the direct link the loop between /ext/ and /ext/sub/ is dead
        assert_eq!(registry.remove_symlink_cascading("/root/s"), 2);
        assert_eq!(registry.paths(), vec!["/root/"]);
        assert!(registry.find_symlink("/ext/sub/back").is_none());
    }

    #[test]
    fn test_chained_symlinks_unwind() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();
        registry.add("/ext1/", Some("/root/l1")).unwrap();
        registry.add("/ext2/", Some("/ext1/l2")).unwrap();
        registry.add("/ext3/", Some("/ext2/deep/l3")).unwrap();

        let removed = registry.remove_symlink_cascading("/root/l1");

        assert_eq!(removed, 3);
        assert_eq!(registry.paths(), vec!["/root/"]);
    }

    #[test]
    fn test_self_referencing_cycle_is_unwatched() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();
        registry.add("/ext/", Some("/root/l")).unwrap();
        registry.add("/ext/", Some("/ext/back")).unwrap();

        registry.remove_symlink_cascading("/root/l");

        assert_eq!(registry.paths(), vec!["/root/"]);
        assert!(registry.find_symlink("/ext/back").is_none());
    }

    #[test]
    fn test_shared_target_needs_every_link_removed() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();
        registry.add("/ext/", Some("/root/l1")).unwrap();
        registry.add("/ext/", Some("/root/l2")).unwrap();

        registry.remove_symlink_cascading("/root/l1");
        assert!(registry.contains_path("/ext/"));

        registry.remove_symlink_cascading("/root/l2");
        assert!(!registry.contains_path("/ext/"));
    }

    #[test]
    fn test_remove_subtree_unwinds_inner_links() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();
        registry.add("/root/sub/", None).unwrap();
        registry.add("/root/sub/deeper/", None).unwrap();
        registry.add("/ext/", Some("/root/sub/link")).unwrap();
        registry.add("/root/subway/", None).unwrap();

        let removed = registry.remove_subtree("/root/sub/");

        assert_eq!(removed, 3);
        assert_eq!(registry.paths(), vec!["/root/", "/root/subway/"]);
    }

    #[test]
    fn test_remove_subtree_keeps_root() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();

        assert_eq!(registry.remove_subtree("/root/"), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_release_all() {
        let mut registry = registry();
        registry.add("/root/", None).unwrap();
        registry.add("/root/a/", None).unwrap();

        registry.release_all();

        assert!(registry.is_empty());
        assert_eq!(registry.source().live_count(), 0);
    }

    #[test]
    fn test_relationships() {
        type R = Registry<ScriptedSource>;
        assert!(R::is_child_of("/usr/opt/parent/", "/usr/opt/parent/child/of/"));
        assert!(!R::is_child_of("/usr/opt/parent/", "/usr/opt/another_parent/child/of/"));
        assert!(R::is_related_to("/a/b/", "/a/"));
        assert!(R::is_related_to("/a/", "/a/b/"));
        assert!(!R::is_related_to("/a/b/", "/a/c/"));
    }
}
