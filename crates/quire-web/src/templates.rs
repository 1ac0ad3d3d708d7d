//! Server-rendered HTML (§6's `GET /`, `/books`, `/articles`, `/highlights`,
//! `/view`). Maud markup in the teacher's style: one function per page
//! shape, a shared head/layout wrapper.

use maud::{html, Markup, DOCTYPE};

use quire_core::{Event, HierarchyNode};

fn layout(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en";
        head {
            meta charset="utf-8";
            meta name="viewport" content="width=device-width, initial-scale=1.0";
            title { (title) }
        }
        body {
            main { (body) }
        }
    }
}

fn event_title(event: &Event) -> String {
    event
        .tags
        .iter()
        .find(|t| t.is_named("title"))
        .and_then(|t| t.value())
        .unwrap_or("untitled")
        .to_string()
}

fn addr_href(event: &Event) -> String {
    match event.replaceable_address() {
        Some(addr) => format!("/?addr={}:{}:{}", addr.kind, addr.author, addr.d),
        None => format!("/?addr={}", event.id),
    }
}

/// `GET /books` / `GET /articles` / `GET /highlights`: a flat list of
/// titled links.
pub fn list_page(title: &str, events: &[Event]) -> Markup {
    layout(
        title,
        html! {
            h1 { (title) }
            ul {
                @for event in events {
                    li { a href=(addr_href(event)) { (event_title(event)) } }
                }
            }
            @if events.is_empty() {
                p { "nothing found" }
            }
        },
    )
}

fn hierarchy_item(node: &HierarchyNode) -> Markup {
    html! {
        li {
            (event_title(&node.event))
            @if !node.children.is_empty() {
                ul {
                    @for child in &node.children {
                        (hierarchy_item(child))
                    }
                }
            }
        }
    }
}

/// `GET /` / `GET /view`: a single publication or article's detail view,
/// with its assembled hierarchy (if any).
pub fn detail_page(event: &Event, hierarchy: Option<&[HierarchyNode]>, content: &str) -> Markup {
    layout(
        &event_title(event),
        html! {
            h1 { (event_title(event)) }
            @if let Some(children) = hierarchy {
                nav {
                    ul {
                        @for child in children {
                            (hierarchy_item(child))
                        }
                    }
                }
            }
            article { (maud::PreEscaped(content)) }
        },
    )
}

/// `GET /status`: cache stats as a plain page.
pub fn status_page(stats: &[(&'static str, quire_cache::NamespaceStats)]) -> Markup {
    layout(
        "status",
        html! {
            h1 { "status" }
            table {
                tr { th { "namespace" } th { "entries" } }
                @for (name, stat) in stats {
                    tr { td { (name) } td { (stat.len) } }
                }
            }
        },
    )
}
