// Shader hot-reload
//
// Watches the directories holding the SPIR-V files and raises a flag when one
// of them changes. The render loop polls the flag and rebuilds the pipeline.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct ShaderWatcher {
    _watcher: RecommendedWatcher,
    changed: Arc<AtomicBool>,
}

impl ShaderWatcher {
    pub fn new(shaders: &[&Path]) -> Result<Self> {
        let changed = Arc::new(AtomicBool::new(false));
        let files: Vec<PathBuf> = shaders.iter().map(|p| normalize(p)).collect();

        let flag = changed.clone();
        let watched = files.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) if is_shader_change(&event, &watched) => {
                    log::debug!("Shader change: {:?}", event.paths);
                    flag.store(true, Ordering::Release);
                }
                Ok(_) => {}
                Err(e) => log::warn!("Shader watch error: {}", e),
            }
        })
        .context("Failed to create shader watcher")?;

        // Watch parent directories: editors and glslc replace files rather than writing in place
        let mut dirs: Vec<PathBuf> = files
            .iter()
            .filter_map(|f| f.parent().map(Path::to_path_buf))
            .collect();
        dirs.sort();
        dirs.dedup();
        for dir in &dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch {}", dir.display()))?;
            log::info!("Watching {} for shader changes", dir.display());
        }

        Ok(Self {
            _watcher: watcher,
            changed,
        })
    }

    /// True once after any watched shader changed
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }
}

fn normalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}

fn is_shader_change(event: &Event, watched: &[PathBuf]) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|p| watched.iter().any(|w| p == w || p.file_name() == w.file_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn modify_of_watched_file_counts() {
        let watched = vec![PathBuf::from("/tmp/shaders/quad.vert.spv")];
        let e = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            "/tmp/shaders/quad.vert.spv",
        );
        assert!(is_shader_change(&e, &watched));

        let e = event(EventKind::Create(CreateKind::File), "/tmp/shaders/quad.vert.spv");
        assert!(is_shader_change(&e, &watched));
    }

    #[test]
    fn unrelated_events_are_ignored() {
        let watched = vec![PathBuf::from("/tmp/shaders/quad.vert.spv")];
        let other_file = event(
            EventKind::Modify(ModifyKind::Any),
            "/tmp/shaders/quad.vert",
        );
        assert!(!is_shader_change(&other_file, &watched));

        let access = event(EventKind::Access(AccessKind::Any), "/tmp/shaders/quad.vert.spv");
        assert!(!is_shader_change(&access, &watched));
    }
}
