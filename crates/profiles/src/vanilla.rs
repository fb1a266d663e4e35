//! The regular timeline site.

use rne_core_types::{IdentityId, NodeId, Selector};
use rne_dom::Document;
use rne_registry::{Descriptor, Identities, RegistryError};
use tracing::debug;

pub const ANCHOR: &str = "div#page-container";

pub const TWEET_REDACTED: &str = "rne-vanilla-tweet-redacted";
pub const PROFILE_CARD_REDACTED: &str = "rne-vanilla-profile-card-redacted";

pub fn roots() -> Result<Vec<Descriptor<Document>>, RegistryError> {
    Ok(vec![
        Descriptor::root("TIMELINE", "div#timeline")?
            .unique(true)
            .subtree(true),
        Descriptor::root("PERMALINK_OVERLAY", "div.PermalinkOverlay-body")?
            .unique(true)
            .subtree(true),
    ])
}

pub fn streams() -> Result<Vec<Descriptor<Document>>, RegistryError> {
    Ok(vec![Descriptor::stream("NAV_STREAM", "ol.js-navigable-stream")?
        .with_test(|doc: &Document, node| doc.has_class(node, "js-navigable-stream"))])
}

pub fn items() -> Result<Vec<Descriptor<Document>>, RegistryError> {
    let content = Selector::parse(":scope > div.content")?;
    let quoted = Selector::parse("div.QuoteTweet-innerContainer[data-user-id]")?;
    let tweet = Descriptor::item(
        "TWEET",
        "div.tweet",
        move |doc: &Document, node| {
            let author = user_id(doc, node);
            let mut all: Vec<IdentityId> = author.iter().cloned().collect();
            if let Some(quote) = doc.select_first(node, &quoted) {
                all.extend(user_id(doc, quote));
            }
            Identities::new(author, all)
        },
        |doc: &Document, node, on| redraw(doc, node, TWEET_REDACTED, on),
    )?
    .with_test(move |doc: &Document, node| {
        is_div_with(doc, node, "tweet") && doc.select_first(node, &content).is_some()
    });

    let bio = Selector::parse(":scope > div.ProfileCard-content p.ProfileCard-bio")?;
    let profile_card = Descriptor::item(
        "PROFILE_CARD",
        "div.ProfileCard",
        |doc: &Document, node| Identities::new(user_id(doc, node), Vec::new()),
        |doc: &Document, node, on| redraw(doc, node, PROFILE_CARD_REDACTED, on),
    )?
    .with_test(move |doc: &Document, node| {
        is_div_with(doc, node, "ProfileCard") && doc.select_first(node, &bio).is_some()
    });

    Ok(vec![tweet, profile_card])
}

fn user_id(doc: &Document, node: NodeId) -> Option<IdentityId> {
    doc.attribute(node, "data-user-id")
        .filter(|id| !id.is_empty())
        .map(IdentityId::from)
}

fn is_div_with(doc: &Document, node: NodeId, class: &str) -> bool {
    doc.tag_name(node)
        .map(|tag| tag.eq_ignore_ascii_case("div"))
        .unwrap_or(false)
        && doc.has_class(node, class)
        && doc.has_attribute(node, "data-user-id")
}

pub(crate) fn redraw(doc: &Document, node: NodeId, class: &str, on: bool) {
    if let Err(err) = doc.toggle_class(node, class, on) {
        debug!(%node, class, error = %err, "redraw skipped");
    }
}
