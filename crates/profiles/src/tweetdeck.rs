//! The multi-column client.
//!
//! Both item kinds share the `article.stream-item` hint and are told apart by
//! the control that opens their dropdown menu. While menu hooking is on, an
//! opened menu gets "Block in RNE" and "Unblock in RNE" entries next to the
//! native block entry, which is hidden.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rne_core_types::{NodeId, Selector};
use rne_dom::{Document, DomError, El};
use rne_registry::{Descriptor, Identities, NodeAddedHook, RegistryError};
use tracing::{debug, warn};

use crate::vanilla::redraw;

pub const ANCHOR: &str = "div.application";

pub const TWEET_REDACTED: &str = "rne-tweetdeck-tweet-redacted";
pub const ACCOUNT_ACTIVITY_REDACTED: &str = "rne-tweetdeck-account-activity-redacted";

/// Marks every node the menu hook inserts.
pub const INJECTED: &str = "rne-added";
pub const DECORATED: &str = "rne-decorated";
pub const SUPPRESSED: &str = "rne-suppressed";

/// Shared on/off switch for menu decoration; clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct MenuHooking(Arc<AtomicBool>);

impl MenuHooking {
    pub fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub fn roots() -> Result<Vec<Descriptor<Document>>, RegistryError> {
    Ok(vec![
        Descriptor::root("APP_COLUMNS", "div#container > div.app-columns")?.unique(true),
        Descriptor::root("SEARCH_PREVIEW", "div.app-search-tweet-results")?.unique(true),
    ])
}

pub fn streams() -> Result<Vec<Descriptor<Document>>, RegistryError> {
    Ok(vec![Descriptor::stream("COLUMN", "section.js-column")?
        .with_test(|doc: &Document, node| {
            has_tag(doc, node, "section") && doc.has_class(node, "js-column")
        })])
}

pub fn items() -> Result<Vec<Descriptor<Document>>, RegistryError> {
    Ok(vec![
        shape_descriptor("TWEET", Arc::new(Shape::tweet()?), TWEET_REDACTED)?,
        shape_descriptor(
            "ACCOUNT_ACTIVITY",
            Arc::new(Shape::account_activity()?),
            ACCOUNT_ACTIVITY_REDACTED,
        )?,
    ])
}

fn shape_descriptor(
    name: &str,
    shape: Arc<Shape>,
    redacted_class: &'static str,
) -> Result<Descriptor<Document>, RegistryError> {
    let extract = Arc::clone(&shape);
    Ok(Descriptor::item(
        name,
        "article.stream-item",
        move |doc: &Document, node| extract.identities(doc, node),
        move |doc: &Document, node, on| redraw(doc, node, redacted_class, on),
    )?
    .with_test(move |doc: &Document, node| shape.test(doc, node)))
}

/// The hook consulted for nodes added under a column.
///
/// Claims `div.js-dropdown` nodes inside a recognised item and decorates the
/// item's menu once; everything else is left to dredging.
pub fn menu_hook(hooking: MenuHooking) -> Result<NodeAddedHook<Document>, RegistryError> {
    let shapes = [Shape::tweet()?, Shape::account_activity()?];
    Ok(Arc::new(move |doc: &Document, node| {
        if !hooking.is_enabled() || !doc.has_class(node, "js-dropdown") {
            return false;
        }
        let mut cursor = doc.parent(node);
        while let Some(ancestor) = cursor {
            if let Some(shape) = shapes.iter().find(|shape| shape.test(doc, ancestor)) {
                if let Err(err) = shape.decorate_menu(doc, ancestor) {
                    warn!(item = %ancestor, error = %err, "menu decoration failed");
                }
                return true;
            }
            cursor = doc.parent(ancestor);
        }
        false
    }))
}

/// Removes every node the menu hook inserted. Returns how many were removed.
pub fn remove_injected(doc: &Document) -> usize {
    let Ok(selector) = Selector::parse(&format!(".{INJECTED}")) else {
        return 0;
    };
    doc.select_all(doc.document_element(), &selector)
        .into_iter()
        .filter(|node| doc.remove(*node).is_ok())
        .count()
}

enum ScreenName {
    /// Text content, minus the leading `@`.
    Text,
    Attribute(&'static str),
}

/// How one item kind exposes its user and its menu.
struct Shape {
    /// The control that opens the dropdown; carries `data-user-id`.
    trigger: Selector,
    screen_name: Selector,
    source: ScreenName,
    native_block: Selector,
}

impl Shape {
    fn tweet() -> Result<Self, RegistryError> {
        Self::new(
            ":scope > div.item-box div.tweet > footer.tweet-footer a.tweet-action[rel='actionsMenu'][data-user-id]",
            ":scope > div.item-box div.tweet > header.tweet-header span.username",
            ScreenName::Text,
        )
    }

    fn account_activity() -> Result<Self, RegistryError> {
        Self::new(
            ":scope > div.item-box div.account-summary > div.with-dropdown > button.js-user-actions-menu[data-user-id]",
            ":scope > div.item-box div.account-summary > div.account-summary-text a.account-link[data-user-name]",
            ScreenName::Attribute("data-user-name"),
        )
    }

    fn new(trigger: &str, screen_name: &str, source: ScreenName) -> Result<Self, RegistryError> {
        Ok(Self {
            trigger: Selector::parse(trigger)?,
            screen_name: Selector::parse(screen_name)?,
            source,
            native_block: Selector::parse("li.is-selectable > a[data-action='block']")?,
        })
    }

    fn trigger(&self, doc: &Document, item: NodeId) -> Option<NodeId> {
        doc.select_first(item, &self.trigger)
    }

    fn user_id(&self, doc: &Document, item: NodeId) -> Option<String> {
        self.trigger(doc, item)
            .and_then(|trigger| doc.attribute(trigger, "data-user-id"))
            .filter(|id| !id.is_empty())
    }

    fn screen_name(&self, doc: &Document, item: NodeId) -> Option<String> {
        let node = doc.select_first(item, &self.screen_name)?;
        let name = match self.source {
            ScreenName::Text => doc.text_content(node).replacen('@', "", 1),
            ScreenName::Attribute(attr) => doc.attribute(node, attr)?,
        };
        Some(name).filter(|name| !name.is_empty())
    }

    fn test(&self, doc: &Document, node: NodeId) -> bool {
        has_tag(doc, node, "article")
            && doc.has_class(node, "stream-item")
            && self.trigger(doc, node).is_some()
            && self.screen_name(doc, node).is_some()
    }

    fn identities(&self, doc: &Document, item: NodeId) -> Identities {
        match self.user_id(doc, item) {
            Some(id) => Identities::single(id),
            None => Identities::default(),
        }
    }

    /// The menu content is short-lived, so decoration is never undone.
    fn decorate_menu(&self, doc: &Document, item: NodeId) -> Result<(), DomError> {
        let Some(menu) = self.trigger(doc, item).and_then(|trigger| doc.parent(trigger)) else {
            return Ok(());
        };
        // Menus on the reader's own tweets have no block entry.
        let Some(native) = doc.select_first(menu, &self.native_block) else {
            return Ok(());
        };
        let Some(wrapper) = doc.parent(native) else {
            return Ok(());
        };
        let Some(list) = doc.parent(wrapper) else {
            return Ok(());
        };
        if doc.has_class(list, DECORATED) {
            return Ok(());
        }

        doc.add_class(list, DECORATED)?;
        doc.add_class(wrapper, SUPPRESSED)?;
        let user_id = self.user_id(doc, item).unwrap_or_default();
        let screen_name = self.screen_name(doc, item);
        for action in [MenuAction::Unblock, MenuAction::Block] {
            let entry = doc.instantiate(&action.entry(&user_id, screen_name.as_deref()));
            doc.insert_after(wrapper, entry)?;
        }
        debug!(%item, user_id = %user_id, "menu decorated");
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum MenuAction {
    Block,
    Unblock,
}

impl MenuAction {
    fn entry(self, user_id: &str, screen_name: Option<&str>) -> El {
        let (action, verb) = match self {
            MenuAction::Block => ("block", "Block"),
            MenuAction::Unblock => ("unblock", "Unblock"),
        };
        let label = match screen_name {
            Some(name) => format!("{verb} @{name} in RNE"),
            None => format!("{verb} in RNE"),
        };
        let mut link = El::new("a")
            .attr("href", "#")
            .attr("data-action", "nop")
            .attr("data-rne-action", action)
            .attr("data-user-id", user_id)
            .text(label);
        if let Some(name) = screen_name {
            link = link.attr("data-user-name", name);
        }
        El::new("li").class(INJECTED).class("is-selectable").child(link)
    }
}

fn has_tag(doc: &Document, node: NodeId, tag: &str) -> bool {
    doc.tag_name(node)
        .map(|actual| actual.eq_ignore_ascii_case(tag))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tweet_item(user: &str, name: &str) -> El {
        El::new("article").class("stream-item").child(
            El::new("div").class("item-box").child(
                El::new("div")
                    .class("tweet")
                    .child(
                        El::new("header")
                            .class("tweet-header")
                            .child(El::new("span").class("username").text(format!("@{name}"))),
                    )
                    .child(
                        El::new("footer").class("tweet-footer").child(
                            El::new("a")
                                .class("tweet-action")
                                .attr("rel", "actionsMenu")
                                .attr("data-user-id", user),
                        ),
                    ),
            ),
        )
    }

    fn activity_item(user: &str, name: &str) -> El {
        El::new("article").class("stream-item").child(
            El::new("div").class("item-box").child(
                El::new("div")
                    .class("account-summary")
                    .child(
                        El::new("div").class("with-dropdown").child(
                            El::new("button")
                                .class("js-user-actions-menu")
                                .attr("data-user-id", user),
                        ),
                    )
                    .child(
                        El::new("div").class("account-summary-text").child(
                            El::new("a")
                                .class("account-link")
                                .attr("data-user-name", name),
                        ),
                    ),
            ),
        )
    }

    #[test]
    fn shapes_tell_item_kinds_apart() {
        let doc = Document::new();
        let tweet = doc.append(doc.body(), &tweet_item("42", "alice")).unwrap();
        let activity = doc.append(doc.body(), &activity_item("7", "bob")).unwrap();
        let tweet_shape = Shape::tweet().unwrap();
        let activity_shape = Shape::account_activity().unwrap();

        assert!(tweet_shape.test(&doc, tweet));
        assert!(!tweet_shape.test(&doc, activity));
        assert!(activity_shape.test(&doc, activity));
        assert_eq!(tweet_shape.screen_name(&doc, tweet).as_deref(), Some("alice"));
        assert_eq!(activity_shape.screen_name(&doc, activity).as_deref(), Some("bob"));
        assert_eq!(
            activity_shape.identities(&doc, activity),
            Identities::single("7")
        );
    }

    #[test]
    fn tweets_without_a_screen_name_are_not_items() {
        let doc = Document::new();
        let tweet = doc.append(doc.body(), &tweet_item("42", "")).unwrap();
        assert!(!Shape::tweet().unwrap().test(&doc, tweet));
    }

    #[test]
    fn menu_entries_carry_the_user() {
        let entry = MenuAction::Block.entry("42", Some("alice"));
        assert_eq!(entry.classes, vec![INJECTED.to_string(), "is-selectable".to_string()]);
        let link = &entry.children[0];
        assert_eq!(link.text.as_deref(), Some("Block @alice in RNE"));
        assert_eq!(link.attrs.get("data-rne-action").map(String::as_str), Some("block"));
        assert_eq!(link.attrs.get("data-user-name").map(String::as_str), Some("alice"));

        let anonymous = MenuAction::Unblock.entry("42", None);
        assert_eq!(anonymous.children[0].text.as_deref(), Some("Unblock in RNE"));
        assert!(!anonymous.children[0].attrs.contains_key("data-user-name"));
    }

    #[test]
    fn menu_hooking_flag_is_shared() {
        let flag = MenuHooking::default();
        let clone = flag.clone();
        assert!(!clone.is_enabled());
        flag.set(true);
        assert!(clone.is_enabled());
    }
}
