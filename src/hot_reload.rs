//! # Hot Reload
//!
//! Watches a YAML route file and re-installs its routes whenever the file is
//! modified. The new table is published with the router's atomic swap, so
//! requests being matched during a reload see either the old table or the new
//! one.
//!
//! If the edited file fails to parse or declares an invalid route, the error
//! is logged and the previous table stays active.
//!
//! ```rust,no_run
//! use routeforge::hot_reload::watch_routes;
//! use routeforge::router::Router;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let router = Arc::new(Router::from_file("config/routes.yaml")?);
//! let _watcher = watch_routes("config/routes.yaml", Arc::clone(&router), |r| {
//!     println!("reloaded {} routes", r.len());
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! Keep the returned watcher alive for as long as reloads are wanted.

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::router::Router;

/// Watch `routes_path` and reload `router` from it on every change.
///
/// `on_reload` runs after each successful reload.
pub fn watch_routes<P, F>(
    routes_path: P,
    router: Arc<Router>,
    mut on_reload: F,
) -> notify::Result<RecommendedWatcher>
where
    P: AsRef<Path>,
    F: FnMut(&Router) + Send + 'static,
{
    let path: PathBuf = routes_path.as_ref().to_path_buf();
    let watch_path = path.clone();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    return;
                }
                match router.load_file(&watch_path) {
                    Ok(()) => {
                        info!(
                            path = %watch_path.display(),
                            routes_count = router.len(),
                            "hot-reload: route table replaced"
                        );
                        on_reload(&router);
                    }
                    Err(e) => warn!(
                        path = %watch_path.display(),
                        error = format!("{e:#}"),
                        "hot-reload: keeping previous routes"
                    ),
                }
            }
            Err(e) => error!(error = %e, "hot-reload: watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&path, RecursiveMode::NonRecursive)?;
    info!(path = %path.display(), "hot-reload: watching route file");
    Ok(watcher)
}
