// #![include_doc("../README.md", start)]
//! # fibril
//!
//! `fibril` is a small UI runtime: a keyed reconciler, a cooperative time-sliced scheduler and fine-grained signals, driving any host backend that implements one trait.
//!
//! > [!WARNING]
//! > Warning: This crate is still in the very early stages of development. APIs will change. Documentation is sparse.
//!
//! ## Features
//!
//! - Keyed child reconciliation that keeps node identity across reorders
//! - Time-sliced rendering: work yields to the host once the frame budget is spent
//! - Independent update trees, merged when one contains another
//! - Signals that patch a single text node or attribute without re-rendering
//! - Effects, immediate effects and cleanups
//! - Backend-agnostic: an in-memory DOM and a retained canvas scene ship with the crate
//!
//! ```rust
//! use fibril::{h, renderer::dom::{Document, DomRenderer}, App, Component};
//!
//! let doc = Document::new();
//! let container = doc.create_container("main");
//! let mut app = App::new(DomRenderer::new(&doc), container);
//!
//! let counter = Component::new("counter", |cx| {
//!     let count = cx.state(|| 0);
//!     let value = count.get();
//!     Ok(h("button")
//!         .on("click", move |_| count.update(|n| *n += 1))
//!         .child(value.to_string())
//!         .into())
//! });
//! app.mount(&counter).unwrap();
//! app.flush_sync().unwrap();
//! assert_eq!(doc.inner_html(container), "<button>0</button>");
//!
//! let button = doc.children(container)[0];
//! doc.dispatch(button, "click", None);
//! app.flush_sync().unwrap();
//! assert_eq!(doc.inner_html(container), "<button>1</button>");
//! ```
//!
//! Components re-render when their own state changes. A signal placed directly in a children list or an attribute is bound to the host object instead, so changing it patches that one object and skips the reconciler entirely.
//!
//! ```rust
//! use fibril::{h, renderer::dom::{Document, DomRenderer}, signal, App};
//!
//! let doc = Document::new();
//! let container = doc.create_container("main");
//! let mut app = App::new(DomRenderer::new(&doc), container);
//!
//! let name = signal(String::from("world"));
//! app.mount(h("p").child("hello ").child(name.clone())).unwrap();
//! app.flush_sync().unwrap();
//!
//! name.set(String::from("fibril"));
//! assert_eq!(doc.inner_html(container), "<p>hello fibril</p>");
//! ```
//!
//! ## License
//!
//! This project is dual licensed under Apache-2.0/MIT. See the two LICENSE-\* files for details.
//!
//! ## Contribution
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted for inclusion in the work by you, as defined in the Apache-2.0 license, shall be dual licensed as above, without any additional terms or conditions.
// #![include_doc("../README.md", end)]
