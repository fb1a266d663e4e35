//! Descriptor sets for the page types the engine knows how to read.

use std::fmt;
use std::str::FromStr;

use rne_core_types::{HostTree, NodeId, ObserveScope, Selector};
use rne_dom::Document;
use rne_registry::{Descriptor, RegistryImpl};
use serde::{Deserialize, Serialize};
use tracing::info;

pub mod errors;
pub mod tweetdeck;
pub mod vanilla;

pub use errors::ProfileError;
pub use tweetdeck::MenuHooking;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageProfile {
    /// The regular timeline site.
    #[default]
    Vanilla,
    /// The multi-column client.
    Tweetdeck,
}

impl PageProfile {
    pub const ALL: [PageProfile; 2] = [PageProfile::Vanilla, PageProfile::Tweetdeck];

    pub fn as_str(self) -> &'static str {
        match self {
            PageProfile::Vanilla => "vanilla",
            PageProfile::Tweetdeck => "tweetdeck",
        }
    }

    /// The element whose presence marks a supported page; new roots appear under it.
    pub fn anchor(self) -> &'static str {
        match self {
            PageProfile::Vanilla => vanilla::ANCHOR,
            PageProfile::Tweetdeck => tweetdeck::ANCHOR,
        }
    }

    pub fn descriptors(self) -> Result<ProfileDescriptors, ProfileError> {
        let descriptors = match self {
            PageProfile::Vanilla => ProfileDescriptors {
                roots: vanilla::roots()?,
                streams: vanilla::streams()?,
                items: vanilla::items()?,
            },
            PageProfile::Tweetdeck => ProfileDescriptors {
                roots: tweetdeck::roots()?,
                streams: tweetdeck::streams()?,
                items: tweetdeck::items()?,
            },
        };
        Ok(descriptors)
    }

    pub fn summary(self) -> Result<ProfileSummary, ProfileError> {
        let descriptors = self.descriptors()?;
        Ok(ProfileSummary {
            name: self.as_str().to_string(),
            anchor: self.anchor().to_string(),
            roots: descriptors.roots.iter().map(DescriptorSummary::from).collect(),
            streams: descriptors.streams.iter().map(DescriptorSummary::from).collect(),
            items: descriptors.items.iter().map(DescriptorSummary::from).collect(),
        })
    }

    /// Configures `engine` for this page type and registers the roots already present.
    ///
    /// The anchor, when found, gets a document watch so roots that show up later are
    /// picked up in any state short of a panic.
    pub fn install(
        self,
        engine: &mut RegistryImpl<Document>,
        menu_hooking: &MenuHooking,
    ) -> Result<Installation, ProfileError> {
        let descriptors = self.descriptors()?;
        engine.set_root_descriptors(descriptors.roots)?;
        engine.set_stream_descriptors(descriptors.streams)?;
        engine.set_item_descriptors(descriptors.items)?;
        engine.set_stream_node_added_hook(match self {
            PageProfile::Vanilla => None,
            PageProfile::Tweetdeck => Some(tweetdeck::menu_hook(menu_hooking.clone())?),
        });

        let anchor_selector = Selector::parse(self.anchor())?;
        let host = engine.host();
        let anchor = host.select_first(host.document_root(), &anchor_selector);
        match anchor {
            Some(node) => engine.watch_document(node, ObserveScope::Children),
            None => info!(
                profile = %self,
                anchor = self.anchor(),
                "anchor missing, not watching for roots"
            ),
        }

        let roots = engine.register_all_roots();
        if roots > 0 {
            info!(profile = %self, roots, "page with roots loaded");
        } else {
            info!(profile = %self, "no roots present, idling");
        }
        Ok(Installation {
            profile: self,
            anchor,
            roots,
        })
    }

    /// Undoes markup the profile injected on its own. Returns the number of nodes removed.
    pub fn remove_injected(self, doc: &Document) -> usize {
        match self {
            PageProfile::Vanilla => 0,
            PageProfile::Tweetdeck => tweetdeck::remove_injected(doc),
        }
    }
}

impl fmt::Display for PageProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageProfile {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageProfile::ALL
            .into_iter()
            .find(|profile| profile.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ProfileError::UnknownProfile(s.to_string()))
    }
}

pub struct ProfileDescriptors {
    pub roots: Vec<Descriptor<Document>>,
    pub streams: Vec<Descriptor<Document>>,
    pub items: Vec<Descriptor<Document>>,
}

/// What [`PageProfile::install`] found on the page.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Installation {
    pub profile: PageProfile,
    pub anchor: Option<NodeId>,
    pub roots: usize,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ProfileSummary {
    pub name: String,
    pub anchor: String,
    pub roots: Vec<DescriptorSummary>,
    pub streams: Vec<DescriptorSummary>,
    pub items: Vec<DescriptorSummary>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DescriptorSummary {
    pub name: String,
    pub hint: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unique: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub subtree: bool,
}

impl<H: HostTree> From<&Descriptor<H>> for DescriptorSummary {
    fn from(descriptor: &Descriptor<H>) -> Self {
        Self {
            name: descriptor.name().to_string(),
            hint: descriptor.hint().to_string(),
            unique: descriptor.is_unique(),
            subtree: descriptor.observe_scope().is_subtree(),
        }
    }
}
