use std::collections::HashMap;

use super::{Conditions, ParamSource, Pattern, Request, ResourceOptions, RouteError, Router};
use crate::query::{QueryMap, Value};

fn matched(router: &Router, request: Request) -> HashMap<String, String> {
    let found = router.match_request(&request);
    assert!(found.is_match(), "no route matched {request:?}");
    found.params.into_iter().collect()
}

fn expect(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn sample_router() -> Router {
    let router = Router::new();
    router
        .prepare(|r| {
            r.match_path("/contact")
                .to(&[("controller", "info"), ("action", "contact")])?;
            r.match_path("/books/:book_id/:action")
                .to(&[("controller", "books")])?;
            r.match_path("/admin/:module/:controller/:action/:id")
                .to(&[("controller", ":module/:controller")])?;
            r.match_path("/accounts").routes(|a| {
                a.to_scope(&[("controller", "accounts")]).routes(|reports| {
                    reports.match_path("/reports").to(&[("action", "reports")])?;
                    reports
                        .match_path("/slideshow/:id")
                        .to(&[("action", "slideshow")])?;
                    Ok(())
                })?;
                a.match_path("/:id/:action.:format")
                    .to(&[("controller", "accounts")])?;
                a.match_path("/:id/:action").to(&[("controller", "accounts")])?;
                Ok(())
            })?;
            r.match_path(Pattern::regex(r"^/movies/:id/movie-[a-z][a-zA-Z\-]+$"))
                .to(&[("controller", "movies"), ("action", "show")])?;
            r.match_path(Pattern::regex(r"^/movies/(\d+)-(\d+)-(\d+)$"))
                .to(&[("controller", "movies"), ("movie_id", "[1][2][3]")])?;
            r.match_with("/movies/create", Conditions::new().method("post"))
                .to(&[("controller", "movies"), ("action", "create")])?;
            r.match_with(
                Pattern::regex("^/movies/(.+)"),
                Conditions::new().custom("user_agent", Pattern::regex("(MSIE|Gecko)")),
            )
            .to(&[
                ("controller", "movies"),
                ("title", "[1]"),
                ("agent", ":user_agent[1]"),
            ])?;
            r.match_conditions(Conditions::new().protocol("http://"))
                .to(&[("controller", "insecure")])?;
            Ok(())
        })
        .unwrap();
    router
}

#[test]
fn test_literal_path() {
    let router = sample_router();
    assert_eq!(
        matched(&router, Request::new("/contact")),
        expect(&[("controller", "info"), ("action", "contact")])
    );
}

#[test]
fn test_placeholders_become_params() {
    let router = sample_router();
    assert_eq!(
        matched(&router, Request::new("/books/12/edit")),
        expect(&[("controller", "books"), ("action", "edit"), ("book_id", "12")])
    );
}

#[test]
fn test_placeholders_combine_in_templates() {
    let router = sample_router();
    assert_eq!(
        matched(&router, Request::new("/admin/accounting/ledgers/show/5")),
        expect(&[
            ("controller", "accounting/ledgers"),
            ("module", "accounting"),
            ("action", "show"),
            ("id", "5"),
        ])
    );
}

#[test]
fn test_nested_scopes_concatenate_paths() {
    let router = sample_router();
    assert_eq!(
        matched(&router, Request::new("/accounts/3/show.xml")),
        expect(&[
            ("controller", "accounts"),
            ("id", "3"),
            ("action", "show"),
            ("format", "xml"),
        ])
    );
    assert_eq!(
        matched(&router, Request::new("/accounts/3/edit")),
        expect(&[("controller", "accounts"), ("id", "3"), ("action", "edit")])
    );
}

#[test]
fn test_param_only_scope_applies_to_children() {
    let router = sample_router();
    assert_eq!(
        matched(&router, Request::new("/accounts/reports")),
        expect(&[("controller", "accounts"), ("action", "reports")])
    );
    assert_eq!(
        matched(&router, Request::new("/accounts/slideshow/9")),
        expect(&[("controller", "accounts"), ("action", "slideshow"), ("id", "9")])
    );
}

#[test]
fn test_regex_path_with_placeholder() {
    let router = sample_router();
    assert_eq!(
        matched(&router, Request::new("/movies/7/movie-casablanca")),
        expect(&[("controller", "movies"), ("action", "show"), ("id", "7")])
    );
}

#[test]
fn test_positional_captures_concatenate() {
    let router = sample_router();
    assert_eq!(
        matched(&router, Request::new("/movies/123-1-9999")),
        expect(&[
            ("controller", "movies"),
            ("action", "index"),
            ("movie_id", "12319999"),
        ])
    );
}

#[test]
fn test_method_condition() {
    let router = sample_router();
    assert_eq!(
        matched(&router, Request::new("/movies/create").method("POST")),
        expect(&[("controller", "movies"), ("action", "create")])
    );
}

#[test]
fn test_custom_field_captures() {
    let router = sample_router();
    let request = Request::new("/movies/create").field("user_agent", "Mozilla Gecko");
    assert_eq!(
        matched(&router, request),
        expect(&[
            ("controller", "movies"),
            ("action", "index"),
            ("title", "create"),
            ("agent", "Gecko"),
        ])
    );
}

#[test]
fn test_protocol_condition_catches_the_rest() {
    let router = sample_router();
    assert_eq!(
        matched(&router, Request::new("/anything/else")),
        expect(&[("controller", "insecure"), ("action", "index")])
    );
    let secure = router.match_request(&Request::new("/anything/else").protocol("https://"));
    assert!(!secure.is_match());
    assert!(secure.params.is_empty());
}

#[test]
fn test_anonymous_captures_by_position() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.match_path("/::/users/::").to(&[
                ("controller", "users"),
                ("action", "[2]"),
                ("id", "[1]"),
            ])?;
            Ok(())
        })
        .unwrap();
    assert_eq!(
        matched(&router, Request::new("/5/users/edit")),
        expect(&[("controller", "users"), ("action", "edit"), ("id", "5")])
    );
}

#[test]
fn test_anonymous_captures_cannot_be_named() {
    let router = Router::new();
    let err = router
        .prepare(|r| {
            r.match_path("/::/users").to(&[("controller", "users")])?.name("users")?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, RouteError::NotReversible { .. }));
}

#[test]
fn test_namespaces() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.match_path("/bar")
                .to(&[("controller", "bar"), ("namespace", "foo")])?;
            r.match_path("/admin")
                .to_scope(&[("namespace", "admin")])
                .routes(|admin| {
                    admin.match_path("/foo").to(&[("controller", "foo")])?;
                    Ok(())
                })?;
            r.match_path("/foo").to(&[("controller", "foo")])?;
            Ok(())
        })
        .unwrap();

    assert_eq!(
        matched(&router, Request::new("/bar")),
        expect(&[("controller", "bar"), ("namespace", "foo"), ("action", "index")])
    );
    assert_eq!(
        matched(&router, Request::new("/admin/foo")),
        expect(&[("controller", "foo"), ("namespace", "admin"), ("action", "index")])
    );
    assert_eq!(
        matched(&router, Request::new("/foo")),
        expect(&[("controller", "foo"), ("action", "index")])
    );
}

#[test]
fn test_host_scope_with_catch_all() {
    let router = Router::new();
    router
        .prepare(|r| {
            let mut host = r.match_conditions(Conditions::new().host(Pattern::regex(r"^admin\b")));
            host.to_scope(&[("namespace", "admin")])
                .routes(|admin| {
                    admin
                        .match_path(Pattern::regex(r"/([A-Z]\w+)\+([A-Z]\w+)/::"))
                        .to(&[
                            ("action", ":path[3]"),
                            ("first_name", ":path[1]"),
                            ("last_name", ":path[2]"),
                        ])?;
                    Ok(())
                })?
                .to(&[("controller", "users"), ("action", "default")])?;
            Ok(())
        })
        .unwrap();

    let admin = Request::new("/Bob+Smith/edit").host("admin.example.com");
    assert_eq!(
        matched(&router, admin),
        expect(&[
            ("namespace", "admin"),
            ("action", "edit"),
            ("first_name", "Bob"),
            ("last_name", "Smith"),
        ])
    );
    assert_eq!(
        matched(&router, Request::new("/whatever").host("admin.example.com")),
        expect(&[("namespace", "admin"), ("controller", "users"), ("action", "default")])
    );
    assert!(!router
        .match_request(&Request::new("/Bob+Smith/edit").host("www.example.com"))
        .is_match());
}

#[test]
fn test_deferred_routes_fall_through() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.match_path(Pattern::regex("^/deferred")).defer_to(&[], |request, _| {
                request.is("xhr").then(|| {
                    [("controller", "ajax"), ("action", "index")]
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect()
                })
            })?;
            r.match_path("/deferred/:action").defer_to(&[], |_, params| {
                let mut params = params.clone();
                params.insert("controller".to_string(), "deferred".to_string());
                Some(params)
            })?;
            Ok(())
        })
        .unwrap();

    let found = router.match_request(&Request::new("/deferred/list").flag("xhr", true));
    assert_eq!(found.index, Some(0));
    assert_eq!(
        found.params.into_iter().collect::<HashMap<_, _>>(),
        expect(&[("controller", "ajax"), ("action", "index")])
    );

    let found = router.match_request(&Request::new("/deferred/list"));
    assert_eq!(found.index, Some(1));
    assert_eq!(
        found.params.into_iter().collect::<HashMap<_, _>>(),
        expect(&[("controller", "deferred"), ("action", "list")])
    );
}

#[test]
fn test_first_declared_route_wins() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.match_path("/items/:id").to(&[("controller", "first")])?;
            r.match_path("/items/:id").to(&[("controller", "second")])?;
            Ok(())
        })
        .unwrap();
    let found = router.match_request(&Request::new("/items/1"));
    assert_eq!(found.index, Some(0));
    assert_eq!(found.get("controller"), Some("first"));
}

#[test]
fn test_method_mismatch_never_matches() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.match_with("/items/:id", Conditions::new().method("get"))
                .to(&[("controller", "items")])?;
            Ok(())
        })
        .unwrap();
    let found = router.match_request(&Request::new("/items/1").method("DELETE"));
    assert_eq!(found.index, None);
    assert!(found.params.is_empty());
}

#[test]
fn test_method_regex_ignores_case() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.match_with("/items", Conditions::new().method(Pattern::regex("^(GET|POST)$")))
                .to(&[("controller", "items")])?;
            Ok(())
        })
        .unwrap();
    assert!(router.match_request(&Request::new("/items").method("POST")).is_match());
    assert!(router.match_request(&Request::new("/items")).is_match());
    assert!(!router.match_request(&Request::new("/items").method("delete")).is_match());
}

#[test]
fn test_nested_offsets_reach_the_right_capture() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.match_path("/:ns").routes(|ns| {
                ns.match_path("/:id").to(&[("name", ":ns_:id")])?;
                Ok(())
            })?;
            Ok(())
        })
        .unwrap();
    let found = router.match_request(&Request::new("/admin/7"));
    assert_eq!(found.get("name"), Some("admin_7"));
    assert_eq!(found.get("ns"), Some("admin"));
    assert_eq!(found.get("id"), Some("7"));
}

#[test]
fn test_escaped_underscore_ends_placeholder() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.match_path("/run/:action")
                .to(&[("handler", r"prefix_:action\_suffix")])?;
            Ok(())
        })
        .unwrap();
    let found = router.match_request(&Request::new("/run/go"));
    assert_eq!(found.get("handler"), Some("prefix_go_suffix"));
}

#[test]
fn test_unknown_placeholder_fails_at_declaration() {
    let router = Router::new();
    let err = router
        .prepare(|r| {
            r.match_path("/x").to(&[("controller", ":missing")])?;
            Ok(())
        })
        .unwrap_err();
    assert_eq!(
        err,
        RouteError::UnknownPlaceholder {
            param: "controller".to_string(),
            placeholder: "missing".to_string(),
        }
    );
    assert!(router.is_empty());
}

#[test]
fn test_invalid_regex_is_reported() {
    let router = Router::new();
    let err = router
        .prepare(|r| {
            r.match_path(Pattern::regex("^/(unclosed")).to(&[])?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, RouteError::InvalidPattern { ref key, .. } if key == "path"));
}

#[test]
fn test_default_routes_apply_defaults() {
    let router = Router::new();
    router.prepare(|r| r.default_routes(&[]).map(|_| ())).unwrap();

    assert_eq!(
        matched(&router, Request::new("/posts")),
        expect(&[("controller", "posts"), ("action", "index")])
    );
    assert_eq!(
        matched(&router, Request::new("/posts/show/3.json")),
        expect(&[
            ("controller", "posts"),
            ("action", "show"),
            ("id", "3"),
            ("format", "json"),
        ])
    );
}

#[test]
fn test_generate_named_route() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.match_path("/items/:id")
                .to(&[("controller", "items"), ("action", "show")])?
                .name("item")?;
            Ok(())
        })
        .unwrap();

    assert_eq!(router.url("item", &[("id", 42)]).unwrap(), "/items/42");
    assert_eq!(
        router
            .url("item", &[("id", "42"), ("sort", "asc")])
            .unwrap(),
        "/items/42?sort=asc"
    );
    assert_eq!(
        router.url("nothing", &[("id", 1)]).unwrap_err(),
        RouteError::NamedRouteNotFound("nothing".to_string())
    );
}

#[test]
fn test_generate_reads_fallback() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.match_path("/:lang/items/:id").to(&[])?.name("localized")?;
            Ok(())
        })
        .unwrap();
    let mut fallback = QueryMap::new();
    fallback.insert("lang".to_string(), Value::from("en"));
    let url = router.generate("localized", &[("id", 3)], &fallback).unwrap();
    assert_eq!(url, "/en/items/3");
}

#[test]
fn test_regex_paths_cannot_be_named() {
    let router = Router::new();
    let err = router
        .prepare(|r| {
            r.match_path(Pattern::regex(r"^/movies/(\d+)$"))
                .to(&[])?
                .name("movie")?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, RouteError::NotReversible { ref name, .. } if name == "movie"));
}

#[test]
fn test_duplicate_names_overwrite() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.match_path("/old").to(&[])?.name("page")?;
            r.match_path("/new").to(&[])?.name("page")?;
            Ok(())
        })
        .unwrap();
    assert_eq!(router.url("page", &[] as &[(&str, &str); 0]).unwrap(), "/new");
}

struct Comment {
    id: u32,
    post_id: u32,
}

impl ParamSource for Comment {
    fn param(&self, name: &str) -> Option<String> {
        match name {
            "id" => Some(self.id.to_string()),
            "blogpost_id" => Some(self.post_id.to_string()),
            _ => None,
        }
    }
}

#[test]
fn test_resources() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.resources_with("blogposts", ResourceOptions::new(), |post| {
                post.resources("comments", ResourceOptions::new())
            })?;
            Ok(())
        })
        .unwrap();

    assert_eq!(
        matched(&router, Request::new("/blogposts")),
        expect(&[("controller", "blogposts"), ("action", "index")])
    );
    assert_eq!(
        matched(&router, Request::new("/blogposts.xml")),
        expect(&[("controller", "blogposts"), ("action", "index"), ("format", "xml")])
    );
    assert_eq!(
        matched(&router, Request::new("/blogposts").method("post")),
        expect(&[("controller", "blogposts"), ("action", "create")])
    );
    assert_eq!(
        matched(&router, Request::new("/blogposts/new")),
        expect(&[("controller", "blogposts"), ("action", "new")])
    );
    assert_eq!(
        matched(&router, Request::new("/blogposts/1;edit")),
        expect(&[("controller", "blogposts"), ("action", "edit"), ("id", "1")])
    );
    assert_eq!(
        matched(&router, Request::new("/blogposts/1").method("delete")),
        expect(&[("controller", "blogposts"), ("action", "destroy"), ("id", "1")])
    );
    assert_eq!(
        matched(&router, Request::new("/blogposts/1/comments/2").method("put")),
        expect(&[
            ("controller", "comments"),
            ("action", "update"),
            ("blogpost_id", "1"),
            ("id", "2"),
        ])
    );

    assert_eq!(router.url("blogposts", &[("page", 2)]).unwrap(), "/blogposts?page=2");
    assert_eq!(router.url("blogpost", &[("id", 1)]).unwrap(), "/blogposts/1");
    assert_eq!(router.url("new_blogpost", &[("x", "")]).unwrap(), "/blogposts/new?x=");
    assert_eq!(router.url("edit_blogpost", &[("id", 1)]).unwrap(), "/blogposts/1/edit");
    assert_eq!(
        router
            .url("custom_blogpost", &[("action", "publish"), ("id", "1")])
            .unwrap(),
        "/blogposts/publish/1"
    );
    let comment = Comment { id: 2, post_id: 1 };
    assert_eq!(router.url("comment", &comment).unwrap(), "/blogposts/1/comments/2");
}

#[test]
fn test_resources_member_and_collection() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.resources(
                "oranges",
                ResourceOptions::new()
                    .name_prefix("florida_")
                    .member("squeeze", &["post", "put"])
                    .collection("ripe", &["get"]),
            )
        })
        .unwrap();

    assert_eq!(
        matched(&router, Request::new("/oranges/4/squeeze").method("put")),
        expect(&[("controller", "oranges"), ("action", "squeeze"), ("id", "4")])
    );
    assert!(!router
        .match_request(&Request::new("/oranges/4/squeeze").method("delete"))
        .is_match());
    assert_eq!(
        matched(&router, Request::new("/oranges;ripe")),
        expect(&[("controller", "oranges"), ("action", "ripe")])
    );
    assert_eq!(
        router.url("squeeze_florida_orange", &[("id", 4)]).unwrap(),
        "/oranges/4/squeeze"
    );
    assert_eq!(
        router.url("ripe_florida_oranges", &[] as &[(&str, &str); 0]).unwrap(),
        "/oranges/ripe"
    );
    assert_eq!(router.url("florida_orange", &[("id", 4)]).unwrap(), "/oranges/4");
}

#[test]
fn test_resources_name_prefix_from_namespace() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.match_path("/zoo")
                .to_scope(&[("namespace", "zoo")])
                .routes(|zoo| zoo.resources("apes", ResourceOptions::new()))?;
            r.resources("grapes", ResourceOptions::new().name_prefix("grape_").singular("grape"))?;
            Ok(())
        })
        .unwrap();

    assert_eq!(router.url("zoo_ape", &[("id", 1)]).unwrap(), "/zoo/apes/1");
    assert_eq!(router.url("grape_grapes", &[("page", 1)]).unwrap(), "/grapes?page=1");
    assert_eq!(router.url("new_grape_grape", &[] as &[(&str, &str); 0]).unwrap(), "/grapes/new");
}

#[test]
fn test_singular_resource() {
    let router = Router::new();
    router
        .prepare(|r| r.resource("profile", ResourceOptions::new()))
        .unwrap();
    assert_eq!(router.len(), 6);
    assert_eq!(
        matched(&router, Request::new("/profile")),
        expect(&[("controller", "profile"), ("action", "show")])
    );
    assert_eq!(
        matched(&router, Request::new("/profile;edit")),
        expect(&[("controller", "profile"), ("action", "edit")])
    );
    assert_eq!(router.url("edit_profile", &[] as &[(&str, &str); 0]).unwrap(), "/profile/edit");

    let err = router
        .prepare(|r| r.resource("profile", ResourceOptions::new().member("x", &["get"])))
        .unwrap_err();
    assert!(matches!(err, RouteError::InvalidOptions(_)));
    assert_eq!(router.len(), 6);
}

#[test]
fn test_append_and_prepend_keep_order_and_names() {
    let router = Router::new();
    router
        .prepare(|r| {
            r.match_path("/b").to(&[("controller", "b")])?.name("b")?;
            Ok(())
        })
        .unwrap();
    router
        .append(|r| {
            r.match_path("/c").to(&[("controller", "c")])?.name("c")?;
            Ok(())
        })
        .unwrap();
    router
        .prepend(|r| {
            r.match_path("/a").to(&[("controller", "a")])?.name("a")?;
            Ok(())
        })
        .unwrap();

    assert_eq!(router.len(), 3);
    for (index, path) in ["/a", "/b", "/c"].iter().enumerate() {
        assert_eq!(router.match_request(&Request::new(*path)).index, Some(index));
        let route = router.route_at(index).unwrap();
        assert_eq!(route.index(), index);
        assert_eq!(router.named_route(&path[1..]).unwrap().index(), index);
    }
    assert_eq!(router.route_names(), vec!["a", "b", "c"]);
}

#[test]
fn test_recompilation_is_idempotent() {
    let corpus = [
        Request::new("/contact"),
        Request::new("/books/1/show"),
        Request::new("/accounts/2/edit.json"),
        Request::new("/movies/1-2-3"),
        Request::new("/movies/create").method("post"),
        Request::new("/nowhere").protocol("https://"),
    ];
    let router = sample_router();
    let first: Vec<_> = corpus.iter().map(|r| router.match_request(r)).collect();
    let again = sample_router();
    let second: Vec<_> = corpus.iter().map(|r| again.match_request(r)).collect();
    assert_eq!(first, second);
}

#[test]
fn test_failed_prepare_keeps_previous_table() {
    let router = sample_router();
    let before = router.len();
    let result = router.prepare(|r| {
        r.match_path("/ok").to(&[])?;
        r.match_path("/bad").to(&[("x", ":nope")])?;
        Ok(())
    });
    assert!(result.is_err());
    assert_eq!(router.len(), before);
}

#[test]
fn test_custom_defaults() {
    let router = Router::new();
    let mut defaults = super::Params::new();
    defaults.insert("action".to_string(), "list".to_string());
    defaults.insert("format".to_string(), "html".to_string());
    router.set_defaults(defaults);
    router
        .prepare(|r| {
            r.match_path(Pattern::regex(r"^/:controller(\.:format)?$")).to(&[])?;
            Ok(())
        })
        .unwrap();
    assert_eq!(
        matched(&router, Request::new("/posts")),
        expect(&[("controller", "posts"), ("action", "list"), ("format", "html")])
    );
}

#[test]
fn test_introspection() {
    let router = sample_router();
    let summaries = router.route_summaries();
    assert_eq!(summaries.len(), router.len());
    assert!(summaries[0].starts_with("[0] path=/^/contact$/"));
    let route = router.route_at(1).unwrap();
    assert_eq!(route.template().as_deref(), Some("/books/:book_id/:action"));
    assert!(!route.is_regexp());
    assert!(router.route_at(7).unwrap().is_regexp());
}
