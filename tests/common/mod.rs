#![allow(dead_code)]

pub mod temp_files {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

    /// Write `content` to a uniquely named file in the temp directory.
    pub fn create_temp_routes(content: &str) -> PathBuf {
        let counter = TEMP_COUNTER.fetch_add(1, Ordering::SeqCst);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "routeforge_test_{}_{}_{}.yaml",
            std::process::id(),
            counter,
            nanos
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Cleanup temporary files (best effort)
    pub fn cleanup_temp_files(paths: &[PathBuf]) {
        for path in paths {
            let _ = std::fs::remove_file(path);
        }
    }
}

pub mod routes {
    use routeforge::router::{Conditions, Pattern, ResourceOptions, Router};
    use std::collections::BTreeMap;

    /// A small application: a named item route, a POST-only login, nested
    /// resources and the default catch-all routes.
    pub fn app_router() -> Router {
        let router = Router::new();
        router
            .prepare(|r| {
                r.match_path("/items/:id")
                    .to(&[("controller", "items"), ("action", "show")])?
                    .name("item")?;
                r.match_with("/login", Conditions::new().method("post"))
                    .to(&[("controller", "sessions"), ("action", "create")])?;
                r.match_conditions(Conditions::new().host(Pattern::regex(r"^api\.")))
                    .to_scope(&[("format", "json")])
                    .routes(|api| {
                        api.match_path("/status").to(&[("controller", "status")])?;
                        Ok(())
                    })?;
                r.resources_with("blogposts", ResourceOptions::new(), |post| {
                    post.resources("comments", ResourceOptions::new())
                })?;
                r.default_routes(&[])?;
                Ok(())
            })
            .unwrap();
        router
    }

    pub fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}
